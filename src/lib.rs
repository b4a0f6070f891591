//! evcharge - EV charging session energy prediction
//!
//! Predicts the energy (kWh) delivered by a charging session from its
//! metadata. Three regressors learn average power (kW) on an allow-listed
//! feature set; predictions are converted back to energy through the session
//! duration before scoring and output.
//!
//! # Modules
//!
//! - [`data`] - Session loading, cleaning and the typed dataset
//! - [`preprocessing`] - Feature allow-list, scaling and one-hot encoding
//! - [`training`] - Split, Lasso, random forest and SVR grid search
//! - [`evaluation`] - Energy-space metrics and baselines
//! - [`output`] - Full-dataset predictions and CSV writing
//! - [`pipeline`] - Staged end-to-end run
//! - [`stations`] - Charging-station inventory summaries
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Core ML modules
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod evaluation;
pub mod output;
pub mod pipeline;

// Station inventory
pub mod stations;

// Services
pub mod cli;

pub use error::{EvChargeError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{EvChargeError, Result};

    // Configuration
    pub use crate::config::{
        ColumnRoles, ForestConfig, GammaSpec, LassoConfig, PipelineConfig, SessionSchema,
        SplitConfig, SvrSearchConfig,
    };

    // Data
    pub use crate::data::{
        CleanedSessions, Durations, EnergyPrediction, EnergyTarget, PowerPrediction, PowerTarget,
        SessionDataset, SessionLoader,
    };

    // Preprocessing
    pub use crate::preprocessing::{FeatureSet, FeatureTransform, FittedTransform};

    // Training
    pub use crate::training::{
        train_test_split, LassoCv, Model, ModelKind, RandomForest, SVMRegressor, SvrGridSearch,
        TrainedModels,
    };

    // Evaluation
    pub use crate::evaluation::{EvaluationReport, Evaluator, RegressionMetrics};

    // Pipeline
    pub use crate::pipeline::{run, run_sessions, RunOutcome, RunReport};

    // Stations
    pub use crate::stations::{StationFilter, StationInventory};
}
