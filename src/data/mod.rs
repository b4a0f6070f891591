//! Session data: loading, cleaning and the typed training dataset
//!
//! - [`sessions`] reads the raw session table and drops invalid sessions
//! - [`timestamp`] parses date-times and derives time-of-day features
//! - [`dataset`] holds index-aligned features, durations and both targets

pub mod dataset;
pub(crate) mod frame;
pub mod sessions;
pub mod timestamp;

pub use dataset::{
    Durations, EnergyPrediction, EnergyTarget, Partition, PowerPrediction, PowerTarget,
    SessionDataset,
};
pub use sessions::{CleanedSessions, CleaningStats, SessionLoader};
