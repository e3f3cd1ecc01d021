//! Error types for featswarm

use thiserror::Error;

/// Result type alias for featswarm operations
pub type Result<T> = std::result::Result<T, FeatswarmError>;

/// Main error type.
///
/// Modeling failures inside a cross-validation fold never escape as this
/// type: backends convert them into a failure marker. What does surface here
/// is setup-time trouble (bad configuration, unreadable data).
#[derive(Error, Debug)]
pub enum FeatswarmError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Convergence failed after {iterations} iterations")]
    ConvergenceError { iterations: usize },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Unseen level '{level}' in column '{column}'")]
    UnseenLevel { column: String, level: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for FeatswarmError {
    fn from(err: polars::error::PolarsError) -> Self {
        FeatswarmError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FeatswarmError {
    fn from(err: serde_json::Error) -> Self {
        FeatswarmError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FeatswarmError {
    fn from(err: ndarray::ShapeError) -> Self {
        FeatswarmError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
