//! Read-only dashboard queries over the registry, experiment store, and
//! performance ledger.
//!
//! These are pure reads and never mutate lifecycle state, so they can be
//! served to dashboards without synchronizing with the controller.

use std::sync::Arc;

use chrono::{Duration, Utc};
use modelgate_state::{
    AuditEntry, Experiment, ExperimentStore, ModelRegistry, ModelVersion, PerformanceLedger,
    PerformanceSample, SampleOutcome,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Rolled-up live performance for one version over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub sample_count: usize,
    /// Mean correctness across correctness samples (classification)
    pub accuracy: Option<f64>,
    /// Mean absolute error across error samples (regression)
    pub mean_error: Option<f64>,
    pub mean_drift: f64,
}

impl PerformanceSummary {
    fn from_samples(samples: &[PerformanceSample]) -> Self {
        let mut correct = 0usize;
        let mut correctness_total = 0usize;
        let mut error_sum = 0.0;
        let mut error_total = 0usize;
        let mut drift_sum = 0.0;
        for s in samples {
            match s.outcome {
                SampleOutcome::Correctness(c) => {
                    correctness_total += 1;
                    if c {
                        correct += 1;
                    }
                }
                SampleOutcome::Error(e) => {
                    error_total += 1;
                    error_sum += e;
                }
            }
            drift_sum += s.drift_score;
        }
        Self {
            sample_count: samples.len(),
            accuracy: (correctness_total > 0)
                .then(|| correct as f64 / correctness_total as f64),
            mean_error: (error_total > 0).then(|| error_sum / error_total as f64),
            mean_drift: if samples.is_empty() {
                0.0
            } else {
                drift_sum / samples.len() as f64
            },
        }
    }
}

/// Full provenance of one model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLineage {
    pub model_version: ModelVersion,
    /// Status history, oldest first
    pub audit_trail: Vec<AuditEntry>,
    /// Experiments in which this version was candidate or baseline
    pub experiments: Vec<Experiment>,
    /// Live performance over the last 7 days
    pub recent_performance: PerformanceSummary,
}

/// Read-side facade over the three stores.
pub struct DashboardQueries {
    registry: Arc<dyn ModelRegistry>,
    experiments: Arc<dyn ExperimentStore>,
    ledger: Arc<dyn PerformanceLedger>,
}

impl DashboardQueries {
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        experiments: Arc<dyn ExperimentStore>,
        ledger: Arc<dyn PerformanceLedger>,
    ) -> Self {
        Self {
            registry,
            experiments,
            ledger,
        }
    }

    /// All versions of a model type with statuses, newest first.
    pub async fn list_models(&self, model_type: &str) -> Result<Vec<ModelVersion>> {
        Ok(self.registry.list_versions(model_type).await?)
    }

    /// All currently running experiments across model types.
    pub async fn active_experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self.experiments.list_active().await?)
    }

    /// Raw sample history for one version over the last `days` days,
    /// most-recent-last.
    pub async fn performance_history(
        &self,
        model_version: &str,
        days: i64,
    ) -> Result<Vec<PerformanceSample>> {
        let since = Utc::now() - Duration::days(days);
        Ok(self.ledger.query(model_version, since).await?)
    }

    /// Trace one version from training through every status change and
    /// every experiment it took part in, with a recent performance rollup.
    pub async fn lineage(&self, model_type: &str, version: &str) -> Result<ModelLineage> {
        let model_version = self.registry.get_version(model_type, version).await?;
        let audit_trail = self.registry.audit_trail(model_type, version).await?;
        let experiments = self
            .experiments
            .list_for_type(model_type)
            .await?
            .into_iter()
            .filter(|e| {
                e.candidate_version == version
                    || e.baseline_version.as_deref() == Some(version)
            })
            .collect();
        let samples = self
            .ledger
            .query(version, Utc::now() - Duration::days(7))
            .await?;
        Ok(ModelLineage {
            model_version,
            audit_trail,
            experiments,
            recent_performance: PerformanceSummary::from_samples(&samples),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(outcome: SampleOutcome, drift: f64) -> PerformanceSample {
        PerformanceSample {
            model_version: "v1".to_string(),
            timestamp: Utc::now(),
            outcome,
            drift_score: drift,
            raw_features: serde_json::json!({}),
            raw_actual: serde_json::json!(null),
            raw_predicted: serde_json::json!(null),
        }
    }

    #[test]
    fn test_summary_of_empty_is_zeroed() {
        let summary = PerformanceSummary::from_samples(&[]);
        assert_eq!(summary.sample_count, 0);
        assert_eq!(summary.accuracy, None);
        assert_eq!(summary.mean_error, None);
        assert_eq!(summary.mean_drift, 0.0);
    }

    #[test]
    fn test_summary_mixes_both_outcome_kinds() {
        let samples = vec![
            sample(SampleOutcome::Correctness(true), 0.2),
            sample(SampleOutcome::Correctness(false), 0.4),
            sample(SampleOutcome::Error(0.3), 0.6),
        ];
        let summary = PerformanceSummary::from_samples(&samples);
        assert_eq!(summary.sample_count, 3);
        assert_eq!(summary.accuracy, Some(0.5));
        assert_eq!(summary.mean_error, Some(0.3));
        assert!((summary.mean_drift - 0.4).abs() < 1e-9);
    }
}
