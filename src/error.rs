//! Error types for the serplens analytics core

use thiserror::Error;

/// Result type alias for serplens operations
pub type Result<T> = std::result::Result<T, SerplensError>;

/// Main error type for the serplens crate
#[derive(Error, Debug)]
pub enum SerplensError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Malformed column '{column}': {reason}")]
    MalformedColumn { column: String, reason: String },

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Insufficient data: {rows} rows, need at least {min} for a train/test split")]
    InsufficientData { rows: usize, min: usize },

    #[error("Invalid model kind: '{0}' (expected RandomForest, LinearRegression or MLPRegressor)")]
    InvalidModelKind(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid email address: '{0}'")]
    InvalidEmail(String),

    #[error("Webhook notification failed: {0}")]
    WebhookError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for SerplensError {
    fn from(err: polars::error::PolarsError) -> Self {
        SerplensError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for SerplensError {
    fn from(err: serde_json::Error) -> Self {
        SerplensError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SerplensError {
    fn from(err: ndarray::ShapeError) -> Self {
        SerplensError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for SerplensError {
    fn from(err: reqwest::Error) -> Self {
        SerplensError::WebhookError(err.to_string())
    }
}
