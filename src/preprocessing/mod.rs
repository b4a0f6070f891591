//! Feature preprocessing
//!
//! - Allow-listed feature extraction ([`FeatureSet`])
//! - Standard scaling for numeric columns
//! - One-hot encoding for categorical columns, unseen categories encode as zeros
//! - A column transform fitted once on training rows ([`FittedTransform`])

mod columns;
mod encoder;
mod scaler;
mod transform;

pub use columns::{FeatureGroup, FeatureKind, FeatureSet};
pub use encoder::OneHotEncoder;
pub use scaler::{ScalerParams, StandardScaler};
pub use transform::{FeatureTransform, FittedTransform};
