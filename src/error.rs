//! Error types for the charging-session pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, EvChargeError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum EvChargeError {
    /// A value in the input could not be parsed (timestamps, energy)
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// Required input columns are absent
    #[error("Schema error: missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Preprocessing error: {0}")]
    Preprocessing(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<polars::error::PolarsError> for EvChargeError {
    fn from(err: polars::error::PolarsError) -> Self {
        EvChargeError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for EvChargeError {
    fn from(err: serde_json::Error) -> Self {
        EvChargeError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for EvChargeError {
    fn from(err: ndarray::ShapeError) -> Self {
        EvChargeError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
