//! Error types for modelgate-state

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// A model version with the same identity already exists
    #[error("duplicate model version: {model_type}/{version}")]
    DuplicateVersion { model_type: String, version: String },

    /// The requested model version does not exist
    #[error("model version not found: {model_type}/{version}")]
    VersionNotFound { model_type: String, version: String },

    /// No version currently holds active status for the model type
    #[error("no active version for model type: {model_type}")]
    NoActiveVersion { model_type: String },

    /// Retired versions are terminal and cannot transition
    #[error("invalid status transition for {model_type}/{version}: {from} -> {to}")]
    InvalidTransition {
        model_type: String,
        version: String,
        from: String,
        to: String,
    },

    /// An experiment with the same id already exists
    #[error("duplicate experiment: {experiment_id}")]
    DuplicateExperiment { experiment_id: String },

    /// The requested experiment does not exist
    #[error("experiment not found: {experiment_id}")]
    ExperimentNotFound { experiment_id: String },

    /// The backing store did not answer within the bounded deadline (retryable)
    #[error("storage timeout after {millis}ms during {operation}")]
    Timeout { operation: String, millis: u64 },

    /// The backing store is unreachable (retryable)
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Whether the caller may retry the operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Timeout { .. } | StorageError::Unavailable(_)
        )
    }
}
