//! Error Handling Module
//!
//! Error types for dataset loading, training and artifact persistence.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the trainer
#[derive(Error, Debug)]
pub enum TrainError {
    /// Invalid or missing configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset directory missing, without class folders, or without images
    #[error("Dataset not found at '{}': {reason}", path.display())]
    DatasetNotFound { path: PathBuf, reason: String },

    /// Image could not be opened or decoded
    #[error("Failed to decode image at '{}': {reason}", path.display())]
    ImageDecode { path: PathBuf, reason: String },

    /// Model construction or shape error
    #[error("Model error: {0}")]
    Model(String),

    /// Saved artifacts missing, unreadable or inconsistent
    #[error("Failed to load model artifacts from '{}': {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TrainError {
    pub fn dataset_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TrainError::DatasetNotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn artifact_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        TrainError::ArtifactLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for TrainError {
    fn from(err: serde_json::Error) -> Self {
        TrainError::Serialization(err.to_string())
    }
}

/// Convenience Result type for trainer operations
pub type Result<T> = std::result::Result<T, TrainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrainError::Config("batch size must be positive".to_string());
        assert_eq!(
            format!("{}", err),
            "Configuration error: batch size must be positive"
        );
    }

    #[test]
    fn test_dataset_not_found_mentions_path() {
        let err = TrainError::dataset_not_found("/data/valid", "directory does not exist");
        let msg = err.to_string();
        assert!(msg.contains("/data/valid"));
        assert!(msg.contains("does not exist"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TrainError = io_err.into();
        assert!(matches!(err, TrainError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: TrainError = json_err.into();
        assert!(matches!(err, TrainError::Serialization(_)));
    }
}
