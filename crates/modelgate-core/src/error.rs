//! Domain-level error taxonomy for the lifecycle core.

use modelgate_state::StorageError;

/// Errors produced by the lifecycle core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// No version of the model type could be loaded at all.
    /// Fatal to the prediction request.
    #[error("no loadable model version for model type: {model_type}")]
    ModelUnavailable { model_type: String },

    /// Loading one specific version failed (non-fatal; router falls back).
    #[error("failed to load model {model_type}/{version}: {reason}")]
    ModelLoadFailed {
        model_type: String,
        version: String,
        reason: String,
    },

    /// The candidate failed one or more validation checks.
    /// Non-fatal to the pipeline; routes the flow to the Rejected state.
    #[error("validation failed for {model_type}/{version}: {failed_checks:?}")]
    ValidationFailed {
        model_type: String,
        version: String,
        failed_checks: Vec<String>,
    },

    /// Training failed for one model type. In batch contexts this is
    /// reported as a result entry, never raised across siblings.
    #[error("training failed for {model_type}: {reason}")]
    TrainingFailed { model_type: String, reason: String },

    /// A lifecycle flow for this model type is already in flight.
    #[error("a lifecycle flow is already in flight for model type: {model_type}")]
    PipelineBusy { model_type: String },

    /// A bounded external call did not complete in time (retryable).
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    /// Storage layer error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether the caller may retry the operation with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Timeout { .. } => true,
            CoreError::Storage(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result type for lifecycle core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
