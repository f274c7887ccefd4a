//! Error types for the driftwatch monitor

use thiserror::Error;

/// Result type alias for drift monitoring operations
pub type Result<T> = std::result::Result<T, DriftError>;

/// Main error type for drift monitoring
#[derive(Error, Debug)]
pub enum DriftError {
    #[error("Schema mismatch: missing {missing:?}, unexpected {unexpected:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("Invalid value for feature '{feature}': {value}")]
    InvalidValue { feature: String, value: f64 },

    #[error("Insufficient data: need at least {required} observations, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Reference dataset not loaded")]
    UninitializedReference,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DriftError {
    /// Whether this error concerns a single rejected observation
    /// rather than the monitor as a whole.
    pub fn is_observation_error(&self) -> bool {
        matches!(
            self,
            DriftError::SchemaMismatch { .. } | DriftError::InvalidValue { .. }
        )
    }
}

impl From<polars::error::PolarsError> for DriftError {
    fn from(err: polars::error::PolarsError) -> Self {
        DriftError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for DriftError {
    fn from(err: serde_json::Error) -> Self {
        DriftError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DriftError {
    fn from(err: ndarray::ShapeError) -> Self {
        DriftError::DataError(format!("invalid reference shape: {}", err))
    }
}
