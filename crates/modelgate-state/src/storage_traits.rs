//! Storage trait definitions for modelgate
//!
//! These traits define the core storage abstractions:
//! - `ModelRegistry`: durable record of model versions and status transitions
//! - `ExperimentStore`: running/closed A-B experiments
//! - `PerformanceLedger`: append-only per-request outcome samples
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ModelRegistry — versioned model records
// ---------------------------------------------------------------------------

/// Lifecycle status of a model version.
///
/// `Retired` is terminal: a retired version never serves traffic again and
/// cannot transition to any other status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Freshly trained, not yet deployed anywhere
    Training,
    /// Serving a canary slice of traffic inside an experiment
    Shadow,
    /// The sole production version for its model type
    Active,
    /// Replaced by a newer active version
    Retired,
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ModelStatus::Training => "training",
            ModelStatus::Shadow => "shadow",
            ModelStatus::Active => "active",
            ModelStatus::Retired => "retired",
        };
        write!(f, "{}", s)
    }
}

/// Per-feature training-time distribution, used for drift scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: f64,
    pub std: f64,
}

/// Evaluation metrics captured at training time.
///
/// Classification models populate accuracy/precision/recall/f1; regression
/// models populate mse/r2. Both leave the other family as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f1_score: Option<f64>,
    pub mse: Option<f64>,
    pub r2_score: Option<f64>,
    /// Cross-validation fold scores
    #[serde(default)]
    pub cross_val_scores: Vec<f64>,
    /// Feature name → importance weight
    #[serde(default)]
    pub feature_importance: HashMap<String, f64>,
    /// Wall-clock training duration in seconds
    pub training_secs: Option<f64>,
    /// Serialized model artifact size in bytes
    pub model_size_bytes: Option<u64>,
}

/// A registered model version. Identity is `(model_type, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Model family, e.g. "default_prediction" or "loan_pricing"
    pub model_type: String,
    /// Version label, unique within the model type
    pub version: String,
    /// Opaque storage handle for the trained artifact
    pub storage_path: String,
    /// When training completed
    pub created_at: DateTime<Utc>,
    pub status: ModelStatus,
    /// Share of live traffic in [0, 100]; implicitly 100 when active
    pub traffic_percentage: f64,
    pub metrics: ModelMetrics,
    /// Training-time feature distributions for drift detection
    #[serde(default)]
    pub training_stats: HashMap<String, FeatureStats>,
}

/// One append-only audit record for a status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub model_type: String,
    pub version: String,
    /// `None` for the initial registration
    pub old_status: Option<ModelStatus>,
    pub new_status: ModelStatus,
    pub timestamp: DateTime<Utc>,
    /// Who or what performed the change
    pub actor: String,
}

/// Model version registry.
///
/// Guarantees:
/// - `(model_type, version)` identities are unique.
/// - At most one version per model type is `Active` at any instant; a
///   promotion retires the previous active version in the same atomic unit.
/// - Every status change appends an `AuditEntry`.
/// - `Retired` is terminal; transitions out of it are rejected.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Insert a new model version. The caller sets the initial status
    /// (normally `Training`). Fails with `DuplicateVersion` if the
    /// identity already exists.
    async fn register(&self, model_version: ModelVersion) -> StorageResult<()>;

    /// Transition a version to a new status.
    ///
    /// When `new_status` is `Active`, the previously active version of the
    /// same model type (if any) is atomically retired with its traffic
    /// zeroed — either both updates are visible or neither.
    async fn update_status(
        &self,
        model_type: &str,
        version: &str,
        new_status: ModelStatus,
        traffic_percentage: Option<f64>,
        actor: &str,
    ) -> StorageResult<()>;

    /// Look up a single version by identity.
    async fn get_version(&self, model_type: &str, version: &str) -> StorageResult<ModelVersion>;

    /// The currently active version for a model type, or `NoActiveVersion`
    /// in the cold-start case (caller must fall back to a default model).
    async fn get_active_version(&self, model_type: &str) -> StorageResult<ModelVersion>;

    /// All versions of a model type, most recent first.
    async fn list_versions(&self, model_type: &str) -> StorageResult<Vec<ModelVersion>>;

    /// Audit trail for one version, oldest first.
    async fn audit_trail(&self, model_type: &str, version: &str)
        -> StorageResult<Vec<AuditEntry>>;
}

// ---------------------------------------------------------------------------
// ExperimentStore — A-B experiment records
// ---------------------------------------------------------------------------

/// Unique identifier for an experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExperimentId(pub String);

impl ExperimentId {
    /// Generate a new random ExperimentId
    pub fn new() -> Self {
        ExperimentId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ExperimentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal disposition of a closed experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Promoted,
    Rejected,
    Expired,
}

/// Experiment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Active,
    Closed(CloseReason),
}

/// A canary/A-B experiment splitting traffic between a baseline and a
/// candidate version of one model type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub experiment_id: ExperimentId,
    pub model_type: String,
    /// The version under test
    pub candidate_version: String,
    /// The version that was active when the experiment began.
    /// `None` when the experiment started against a cold registry.
    /// Immutable once set.
    pub baseline_version: Option<String>,
    /// Share of requests routed to the candidate, in [0, 100]
    pub traffic_percentage: f64,
    pub start_time: DateTime<Utc>,
    pub status: ExperimentStatus,
}

/// Experiment store.
///
/// Guarantees:
/// - `close` is idempotent: closing an already-closed experiment is a no-op
///   that preserves the original close reason.
/// - The baseline version captured at creation is never rewritten.
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    /// Persist a new experiment. Fails with `DuplicateExperiment` if the id
    /// is already taken.
    async fn create(&self, experiment: Experiment) -> StorageResult<()>;

    /// Retrieve an experiment by id.
    async fn get(&self, experiment_id: &ExperimentId) -> StorageResult<Experiment>;

    /// Close an experiment with the given reason, returning the stored
    /// record. A second close is a no-op and returns the record unchanged.
    async fn close(
        &self,
        experiment_id: &ExperimentId,
        reason: CloseReason,
    ) -> StorageResult<Experiment>;

    /// Active experiments for one model type.
    async fn active_for(&self, model_type: &str) -> StorageResult<Vec<Experiment>>;

    /// Every experiment (active or closed) for one model type, newest first.
    async fn list_for_type(&self, model_type: &str) -> StorageResult<Vec<Experiment>>;

    /// All active experiments across model types.
    async fn list_active(&self) -> StorageResult<Vec<Experiment>>;
}

// ---------------------------------------------------------------------------
// PerformanceLedger — per-request outcome samples
// ---------------------------------------------------------------------------

/// Observed outcome for one served prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOutcome {
    /// Classification: whether the prediction matched ground truth
    Correctness(bool),
    /// Regression: absolute prediction error
    Error(f64),
}

/// Append-only record of one live prediction and its outcome.
/// Never mutated or deleted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub model_version: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: SampleOutcome,
    /// Mean normalized distance of live features from training distribution
    pub drift_score: f64,
    pub raw_features: serde_json::Value,
    pub raw_actual: serde_json::Value,
    pub raw_predicted: serde_json::Value,
}

/// Time-series ledger of performance samples keyed by model version.
///
/// Guarantees:
/// - `record` is a pure append; samples are never rewritten.
/// - `query` returns samples most-recent-last.
#[async_trait]
pub trait PerformanceLedger: Send + Sync {
    /// Append one sample.
    async fn record(&self, sample: PerformanceSample) -> StorageResult<()>;

    /// Samples for a version at or after `since`, ordered by timestamp
    /// ascending (most-recent-last).
    async fn query(
        &self,
        model_version: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<PerformanceSample>>;
}
