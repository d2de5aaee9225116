//! Error types for feature derivation, encoding, training and inference.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Error type for every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Shape mismatch between expected and actual matrix dimensions.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape { expected: String, got: String },
    /// Numerical computation error (singular system, overflow, etc.).
    #[error("Numerical error: {0}")]
    NumericalError(String),
    /// Invalid hyperparameter or configuration value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed training corpus.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Empty data provided where non-empty was required.
    #[error("Empty data: {0}")]
    EmptyData(String),
    /// Feature dimension mismatch.
    #[error("Feature mismatch: expected {expected_features} features, got {got_features}")]
    FeatureMismatch {
        expected_features: usize,
        got_features: usize,
    },
    /// A column required by an operation is not present in the frame.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
    /// A column exists but holds the wrong kind of values.
    #[error("Column {column} is not {expected}")]
    ColumnType { column: String, expected: &'static str },
    /// Neither the local model file nor the tracking directory produced a model.
    #[error(
        "No model found: place a model at {} or ensure tracked model artifacts exist under {}",
        local.display(),
        tracking.display()
    )]
    ModelNotFound { local: PathBuf, tracking: PathBuf },
    /// A required fitted artifact does not exist.
    #[error("Missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),
    /// A required fitted artifact exists but cannot be decoded.
    #[error("Corrupt artifact {}: {reason}", path.display())]
    CorruptArtifact { path: PathBuf, reason: String },
    /// Failure downstream of a fully reconciled row.
    #[error("Prediction failed: {0}")]
    PredictionFailed(String),
    /// The training corpus produced a degenerate label distribution.
    #[error("Labeling error: {0}")]
    Labeling(String),
    /// Fitting was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::InvalidParameter(err.to_string())
    }
}
