//! In-memory fakes for storage traits (testing and single-process use)
//!
//! Provides `MemoryModelRegistry`, `MemoryExperimentStore`, and
//! `MemoryPerformanceLedger` that satisfy the trait contracts without any
//! external dependencies. Each fake holds its state behind a single mutex,
//! which makes multi-record updates (notably the active-swap on promotion)
//! atomic with respect to all readers.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryModelRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RegistryInner {
    /// model_type → versions (insertion order)
    versions: HashMap<String, Vec<ModelVersion>>,
    audit: Vec<AuditEntry>,
}

/// In-memory model registry backed by a `HashMap<model_type, Vec<ModelVersion>>`.
#[derive(Debug, Default)]
pub struct MemoryModelRegistry {
    inner: Mutex<RegistryInner>,
}

impl MemoryModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelRegistry for MemoryModelRegistry {
    async fn register(&self, model_version: ModelVersion) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let family = inner
            .versions
            .entry(model_version.model_type.clone())
            .or_default();
        if family.iter().any(|v| v.version == model_version.version) {
            return Err(StorageError::DuplicateVersion {
                model_type: model_version.model_type.clone(),
                version: model_version.version.clone(),
            });
        }
        let entry = AuditEntry {
            model_type: model_version.model_type.clone(),
            version: model_version.version.clone(),
            old_status: None,
            new_status: model_version.status,
            timestamp: Utc::now(),
            actor: "registry".to_string(),
        };
        family.push(model_version);
        inner.audit.push(entry);
        Ok(())
    }

    async fn update_status(
        &self,
        model_type: &str,
        version: &str,
        new_status: ModelStatus,
        traffic_percentage: Option<f64>,
        actor: &str,
    ) -> StorageResult<()> {
        // Single lock scope: the demotion of the previous active version and
        // the promotion of the new one are visible together or not at all.
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let family = inner
            .versions
            .get_mut(model_type)
            .ok_or_else(|| StorageError::VersionNotFound {
                model_type: model_type.to_string(),
                version: version.to_string(),
            })?;

        let target_idx = family
            .iter()
            .position(|v| v.version == version)
            .ok_or_else(|| StorageError::VersionNotFound {
                model_type: model_type.to_string(),
                version: version.to_string(),
            })?;

        let old_status = family[target_idx].status;
        if old_status == ModelStatus::Retired {
            return Err(StorageError::InvalidTransition {
                model_type: model_type.to_string(),
                version: version.to_string(),
                from: old_status.to_string(),
                to: new_status.to_string(),
            });
        }

        let mut entries = Vec::new();

        if new_status == ModelStatus::Active {
            for v in family.iter_mut() {
                if v.status == ModelStatus::Active && v.version != version {
                    entries.push(AuditEntry {
                        model_type: model_type.to_string(),
                        version: v.version.clone(),
                        old_status: Some(ModelStatus::Active),
                        new_status: ModelStatus::Retired,
                        timestamp: now,
                        actor: actor.to_string(),
                    });
                    v.status = ModelStatus::Retired;
                    v.traffic_percentage = 0.0;
                }
            }
        }

        let target = &mut family[target_idx];
        target.status = new_status;
        target.traffic_percentage = match (new_status, traffic_percentage) {
            (ModelStatus::Active, None) => 100.0,
            (ModelStatus::Retired, _) => 0.0,
            (_, Some(pct)) => pct.clamp(0.0, 100.0),
            (_, None) => target.traffic_percentage,
        };
        entries.push(AuditEntry {
            model_type: model_type.to_string(),
            version: version.to_string(),
            old_status: Some(old_status),
            new_status,
            timestamp: now,
            actor: actor.to_string(),
        });

        inner.audit.extend(entries);
        Ok(())
    }

    async fn get_version(&self, model_type: &str, version: &str) -> StorageResult<ModelVersion> {
        let inner = self.inner.lock().unwrap();
        inner
            .versions
            .get(model_type)
            .and_then(|family| family.iter().find(|v| v.version == version))
            .cloned()
            .ok_or_else(|| StorageError::VersionNotFound {
                model_type: model_type.to_string(),
                version: version.to_string(),
            })
    }

    async fn get_active_version(&self, model_type: &str) -> StorageResult<ModelVersion> {
        let inner = self.inner.lock().unwrap();
        inner
            .versions
            .get(model_type)
            .and_then(|family| family.iter().find(|v| v.status == ModelStatus::Active))
            .cloned()
            .ok_or_else(|| StorageError::NoActiveVersion {
                model_type: model_type.to_string(),
            })
    }

    async fn list_versions(&self, model_type: &str) -> StorageResult<Vec<ModelVersion>> {
        let inner = self.inner.lock().unwrap();
        let mut versions = inner
            .versions
            .get(model_type)
            .cloned()
            .unwrap_or_default();
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(versions)
    }

    async fn audit_trail(
        &self,
        model_type: &str,
        version: &str,
    ) -> StorageResult<Vec<AuditEntry>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .audit
            .iter()
            .filter(|e| e.model_type == model_type && e.version == version)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryExperimentStore
// ---------------------------------------------------------------------------

/// In-memory experiment store backed by a `HashMap<experiment_id, Experiment>`.
#[derive(Debug, Default)]
pub struct MemoryExperimentStore {
    experiments: Mutex<HashMap<String, Experiment>>,
}

impl MemoryExperimentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExperimentStore for MemoryExperimentStore {
    async fn create(&self, experiment: Experiment) -> StorageResult<()> {
        let mut experiments = self.experiments.lock().unwrap();
        let id = experiment.experiment_id.0.clone();
        if experiments.contains_key(&id) {
            return Err(StorageError::DuplicateExperiment { experiment_id: id });
        }
        experiments.insert(id, experiment);
        Ok(())
    }

    async fn get(&self, experiment_id: &ExperimentId) -> StorageResult<Experiment> {
        let experiments = self.experiments.lock().unwrap();
        experiments
            .get(&experiment_id.0)
            .cloned()
            .ok_or_else(|| StorageError::ExperimentNotFound {
                experiment_id: experiment_id.0.clone(),
            })
    }

    async fn close(
        &self,
        experiment_id: &ExperimentId,
        reason: CloseReason,
    ) -> StorageResult<Experiment> {
        let mut experiments = self.experiments.lock().unwrap();
        let experiment = experiments.get_mut(&experiment_id.0).ok_or_else(|| {
            StorageError::ExperimentNotFound {
                experiment_id: experiment_id.0.clone(),
            }
        })?;
        // Idempotent: a second close keeps the original reason.
        if experiment.status == ExperimentStatus::Active {
            experiment.status = ExperimentStatus::Closed(reason);
        }
        Ok(experiment.clone())
    }

    async fn active_for(&self, model_type: &str) -> StorageResult<Vec<Experiment>> {
        let experiments = self.experiments.lock().unwrap();
        Ok(experiments
            .values()
            .filter(|e| e.model_type == model_type && e.status == ExperimentStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_for_type(&self, model_type: &str) -> StorageResult<Vec<Experiment>> {
        let experiments = self.experiments.lock().unwrap();
        let mut out: Vec<Experiment> = experiments
            .values()
            .filter(|e| e.model_type == model_type)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(out)
    }

    async fn list_active(&self) -> StorageResult<Vec<Experiment>> {
        let experiments = self.experiments.lock().unwrap();
        Ok(experiments
            .values()
            .filter(|e| e.status == ExperimentStatus::Active)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryPerformanceLedger
// ---------------------------------------------------------------------------

/// In-memory performance ledger backed by a `HashMap<model_version, Vec<PerformanceSample>>`.
#[derive(Debug, Default)]
pub struct MemoryPerformanceLedger {
    samples: Mutex<HashMap<String, Vec<PerformanceSample>>>,
}

impl MemoryPerformanceLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PerformanceLedger for MemoryPerformanceLedger {
    async fn record(&self, sample: PerformanceSample) -> StorageResult<()> {
        let mut samples = self.samples.lock().unwrap();
        samples
            .entry(sample.model_version.clone())
            .or_default()
            .push(sample);
        Ok(())
    }

    async fn query(
        &self,
        model_version: &str,
        since: DateTime<Utc>,
    ) -> StorageResult<Vec<PerformanceSample>> {
        let samples = self.samples.lock().unwrap();
        let mut out: Vec<PerformanceSample> = samples
            .get(model_version)
            .map(|s| s.iter().filter(|x| x.timestamp >= since).cloned().collect())
            .unwrap_or_default();
        out.sort_by_key(|s| s.timestamp);
        Ok(out)
    }
}
