//! Modelgate-State: storage capability layer for modelgate
//!
//! This crate provides the persistence abstractions for the model lifecycle
//! control core. The core requires only get/put/update-with-condition
//! semantics (for the atomic active-swap) and range queries by version and
//! time window, so the traits here are implementable over any durable
//! key-value or table store.
//!
//! ## Layer 0 - Data/Persistence
//!
//! ## Key Components
//!
//! - `ModelRegistry`: model versions, status transitions, audit trail
//! - `ExperimentStore`: canary/A-B experiments
//! - `PerformanceLedger`: append-only per-request outcome samples
//!
//! In-memory implementations of all three live in [`fakes`].

mod error;
pub mod fakes;
pub mod storage_traits;

pub use error::StorageError;
pub use storage_traits::{
    AuditEntry, CloseReason, Experiment, ExperimentId, ExperimentStatus, ExperimentStore,
    FeatureStats, ModelMetrics, ModelRegistry, ModelStatus, ModelVersion, PerformanceLedger,
    PerformanceSample, SampleOutcome, StorageResult,
};
