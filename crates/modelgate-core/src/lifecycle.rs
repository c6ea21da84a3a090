//! Lifecycle orchestration: train → validate → deploy-canary → monitor →
//! analyze → promote/retire.
//!
//! The controller is effectively single-threaded per model type: a second
//! training trigger while a flow is in flight is rejected with
//! `PipelineBusy`, never run concurrently. Training failures in batch runs
//! are isolated per model type and reported as result entries; siblings
//! continue. Calls to the external trainer are bounded by a timeout so a
//! hung trainer cannot wedge the state machine.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use modelgate_state::{
    CloseReason, Experiment, ExperimentId, ExperimentStore, ModelRegistry, ModelStatus,
    ModelVersion,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, Instrument};

use crate::analyzer::{AnalysisReport, ExperimentAnalyzer, Recommendation};
use crate::error::{CoreError, Result};
use crate::events::{publish_best_effort, EventSink, LifecycleEvent, LifecycleEventKind};
use crate::monitor::PerformanceAlert;
use crate::obs;
use crate::router::TrafficRouter;
use crate::trainer::{HyperParameters, ModelTrainer};
use crate::validation::{validate_model, ValidationConfig, ValidationReport};

/// Stages of the lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Training,
    Validating,
    Canary,
    Monitoring,
    Promoted,
    Rejected,
    Expired,
}

/// What kicked off a training flow. Emergency runs trade hyperparameter
/// budget for turnaround and get a larger canary slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Scheduled,
    Triggered,
    Emergency,
}

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Canary traffic for scheduled retraining
    pub canary_traffic_pct: f64,
    /// Canary traffic for performance/drift-triggered retraining
    pub triggered_traffic_pct: f64,
    /// Canary traffic for emergency retraining
    pub emergency_traffic_pct: f64,
    /// Upper bound on one trainer call
    #[serde(with = "duration_millis")]
    pub trainer_timeout: Duration,
    pub validation: ValidationConfig,
    /// Actor recorded in registry audit entries
    pub actor: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            canary_traffic_pct: 10.0,
            triggered_traffic_pct: 20.0,
            emergency_traffic_pct: 50.0,
            trainer_timeout: Duration::from_secs(30),
            validation: ValidationConfig::default(),
            actor: "lifecycle-controller".to_string(),
        }
    }
}

mod duration_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Result entry for one model type's pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub model_type: String,
    /// Final stage the flow reached
    pub stage: PipelineStage,
    pub model_version: Option<String>,
    pub experiment_id: Option<ExperimentId>,
    pub validation: Option<ValidationReport>,
    pub error: Option<String>,
}

impl PipelineOutcome {
    /// Flat status label for result reporting.
    pub fn status_label(&self) -> &'static str {
        match (self.stage, self.error.is_some()) {
            (PipelineStage::Monitoring, _) => "deployed_for_testing",
            (PipelineStage::Rejected, _) => "validation_failed",
            (PipelineStage::Promoted, _) => "promoted",
            (_, true) => "training_failed",
            _ => "incomplete",
        }
    }

    fn failure(model_type: &str, stage: PipelineStage, error: &CoreError) -> Self {
        Self {
            model_type: model_type.to_string(),
            stage,
            model_version: None,
            experiment_id: None,
            validation: None,
            error: Some(error.to_string()),
        }
    }
}

/// Action taken after one analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisAction {
    Promoted,
    ContinueMonitoring,
}

/// Analysis report plus what the controller did with it.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisDecision {
    pub report: AnalysisReport,
    pub action: AnalysisAction,
}

/// Orchestrates the full model lifecycle against the registry, experiment
/// store, router, trainer, and event sink.
pub struct LifecycleController {
    registry: Arc<dyn ModelRegistry>,
    experiments: Arc<dyn ExperimentStore>,
    trainer: Arc<dyn ModelTrainer>,
    analyzer: ExperimentAnalyzer,
    router: Arc<TrafficRouter>,
    events: Arc<dyn EventSink>,
    config: LifecycleConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Removes the model type from the in-flight set when the flow ends.
struct FlightGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    model_type: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap().remove(&self.model_type);
    }
}

impl LifecycleController {
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        experiments: Arc<dyn ExperimentStore>,
        trainer: Arc<dyn ModelTrainer>,
        analyzer: ExperimentAnalyzer,
        router: Arc<TrafficRouter>,
        events: Arc<dyn EventSink>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            registry,
            experiments,
            trainer,
            analyzer,
            router,
            events,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Scheduled batch retraining across model types.
    ///
    /// Failures are isolated: one model type's error becomes a
    /// `training_failed` result entry and its siblings keep running.
    pub async fn run_scheduled_training(&self, model_types: &[&str]) -> Vec<PipelineOutcome> {
        let mut results = Vec::with_capacity(model_types.len());
        for model_type in model_types {
            match self.run_pipeline(model_type, Priority::Scheduled).await {
                Ok(outcome) => results.push(outcome),
                Err(e) => {
                    error!(
                        event = "lifecycle.training_failed",
                        model_type = %model_type,
                        error = %e,
                    );
                    results.push(PipelineOutcome::failure(
                        model_type,
                        PipelineStage::Training,
                        &e,
                    ));
                }
            }
        }
        results
    }

    /// Single-type retraining for performance/drift triggers.
    pub async fn run_triggered_training(
        &self,
        model_type: &str,
        priority: Priority,
    ) -> Result<PipelineOutcome> {
        self.run_pipeline(model_type, priority).await
    }

    /// React to monitoring alerts: any critical alert triggers emergency
    /// retraining for the affected model type. Returns the retraining
    /// outcome, or `None` when no alert was critical.
    pub async fn handle_alerts(
        &self,
        model_type: &str,
        alerts: &[PerformanceAlert],
    ) -> Option<Result<PipelineOutcome>> {
        if !alerts.iter().any(|a| a.is_critical()) {
            return None;
        }
        publish_best_effort(
            self.events.as_ref(),
            LifecycleEvent::new(LifecycleEventKind::EmergencyRetrainingTriggered, model_type)
                .with_detail(serde_json::json!({
                    "alerts": alerts,
                })),
        )
        .await;
        Some(self.run_pipeline(model_type, Priority::Emergency).await)
    }

    /// Analyze an experiment and apply the recommendation: promotion swaps
    /// the registry atomically, closes the experiment, and invalidates the
    /// router cache; continue-monitoring is a self-loop re-evaluated on the
    /// next scheduled analysis.
    pub async fn analyze_and_apply(
        &self,
        experiment_id: &ExperimentId,
    ) -> Result<AnalysisDecision> {
        let report = self.analyzer.analyze(experiment_id).await?;
        match report.recommendation {
            Recommendation::Promote => {
                let experiment = self.experiments.get(experiment_id).await?;
                self.registry
                    .update_status(
                        &experiment.model_type,
                        &experiment.candidate_version,
                        ModelStatus::Active,
                        None,
                        &self.config.actor,
                    )
                    .await?;
                self.experiments
                    .close(experiment_id, CloseReason::Promoted)
                    .await?;
                self.router.invalidate(&experiment.model_type);
                obs::emit_promotion(
                    &experiment.model_type,
                    &experiment.candidate_version,
                    report.improvement,
                    report.p_value,
                );
                publish_best_effort(
                    self.events.as_ref(),
                    LifecycleEvent::new(LifecycleEventKind::ModelPromoted, &experiment.model_type)
                        .with_version(&experiment.candidate_version)
                        .with_experiment(experiment_id.to_string())
                        .with_detail(serde_json::json!({
                            "improvement": report.improvement,
                            "p_value": report.p_value,
                            "duration_days": report.duration_days,
                        })),
                )
                .await;
                Ok(AnalysisDecision {
                    report,
                    action: AnalysisAction::Promoted,
                })
            }
            Recommendation::ContinueMonitoring => {
                info!(
                    event = "lifecycle.continue_monitoring",
                    experiment_id = %experiment_id,
                    improvement = report.improvement,
                    p_value = report.p_value,
                    duration_days = report.duration_days,
                );
                Ok(AnalysisDecision {
                    report,
                    action: AnalysisAction::ContinueMonitoring,
                })
            }
        }
    }

    /// Operational escape hatch: close an experiment without a promotion
    /// decision. Idempotent — expiring an already-closed experiment is a
    /// no-op.
    pub async fn expire_experiment(&self, experiment_id: &ExperimentId) -> Result<Experiment> {
        let experiment = self
            .experiments
            .close(experiment_id, CloseReason::Expired)
            .await?;
        self.router.invalidate(&experiment.model_type);
        Ok(experiment)
    }

    async fn run_pipeline(
        &self,
        model_type: &str,
        priority: Priority,
    ) -> Result<PipelineOutcome> {
        let span = obs::flow_span(model_type);
        self.pipeline_flow(model_type, priority).instrument(span).await
    }

    async fn pipeline_flow(
        &self,
        model_type: &str,
        priority: Priority,
    ) -> Result<PipelineOutcome> {
        let _guard = self.begin_flight(model_type)?;
        obs::emit_pipeline_started(model_type, &format!("{:?}", priority).to_lowercase());
        publish_best_effort(
            self.events.as_ref(),
            LifecycleEvent::new(LifecycleEventKind::TrainingStarted, model_type)
                .with_detail(serde_json::json!({ "priority": priority })),
        )
        .await;

        // Training
        let hyperparameters = match priority {
            Priority::Emergency => HyperParameters::emergency(),
            _ => HyperParameters::default(),
        };
        let dataset = match priority {
            Priority::Emergency => format!("training/{}/realtime", model_type),
            _ => format!("training/{}/latest", model_type),
        };
        let trained = match tokio::time::timeout(
            self.config.trainer_timeout,
            self.trainer.train(model_type, &dataset, &hyperparameters),
        )
        .await
        {
            Ok(Ok(trained)) => trained,
            Ok(Err(e)) => {
                self.publish_training_failed(model_type, &e).await;
                return Err(e);
            }
            Err(_) => {
                let e = CoreError::Timeout {
                    operation: format!("train({})", model_type),
                    millis: self.config.trainer_timeout.as_millis() as u64,
                };
                self.publish_training_failed(model_type, &e).await;
                return Err(e);
            }
        };

        let version = generate_version_label();
        let candidate = ModelVersion {
            model_type: model_type.to_string(),
            version: version.clone(),
            storage_path: trained.storage_path,
            created_at: Utc::now(),
            status: ModelStatus::Training,
            traffic_percentage: 0.0,
            metrics: trained.metrics,
            training_stats: trained.training_stats,
        };
        self.registry.register(candidate.clone()).await?;
        obs::emit_version_registered(model_type, &version);

        // Validating
        let report = validate_model(&candidate, &self.config.validation);
        if !report.passed() {
            let failed = report.failed_checks();
            obs::emit_validation_failed(model_type, &version, &failed);
            // Discard the candidate; the audit trail records which checks
            // sank it.
            self.registry
                .update_status(
                    model_type,
                    &version,
                    ModelStatus::Retired,
                    None,
                    &format!("validator(failed: {})", failed.join(", ")),
                )
                .await?;
            publish_best_effort(
                self.events.as_ref(),
                LifecycleEvent::new(LifecycleEventKind::ValidationFailed, model_type)
                    .with_version(&version)
                    .with_detail(serde_json::json!({ "failed_checks": failed })),
            )
            .await;
            return Ok(PipelineOutcome {
                model_type: model_type.to_string(),
                stage: PipelineStage::Rejected,
                model_version: Some(version),
                experiment_id: None,
                validation: Some(report),
                error: None,
            });
        }

        // Canary deploy: capture the baseline before the candidate goes
        // shadow, then start the experiment.
        let traffic = match priority {
            Priority::Scheduled => self.config.canary_traffic_pct,
            Priority::Triggered => self.config.triggered_traffic_pct,
            Priority::Emergency => self.config.emergency_traffic_pct,
        };
        let baseline_version = self
            .registry
            .get_active_version(model_type)
            .await
            .ok()
            .map(|v| v.version);
        self.registry
            .update_status(
                model_type,
                &version,
                ModelStatus::Shadow,
                Some(traffic),
                &self.config.actor,
            )
            .await?;
        let experiment = Experiment {
            experiment_id: ExperimentId::new(),
            model_type: model_type.to_string(),
            candidate_version: version.clone(),
            baseline_version,
            traffic_percentage: traffic,
            start_time: Utc::now(),
            status: modelgate_state::ExperimentStatus::Active,
        };
        self.experiments.create(experiment.clone()).await?;
        obs::emit_experiment_started(
            model_type,
            &experiment.experiment_id.to_string(),
            &version,
            traffic,
        );
        publish_best_effort(
            self.events.as_ref(),
            LifecycleEvent::new(LifecycleEventKind::ModelDeployedForTesting, model_type)
                .with_version(&version)
                .with_experiment(experiment.experiment_id.to_string())
                .with_detail(serde_json::json!({
                    "traffic_percentage": traffic,
                    "priority": priority,
                    "accuracy": candidate.metrics.accuracy,
                    "training_secs": candidate.metrics.training_secs,
                })),
        )
        .await;

        // Canary → Monitoring is immediate: the ledger starts accumulating
        // variant-tagged samples as soon as the router sees the experiment.
        Ok(PipelineOutcome {
            model_type: model_type.to_string(),
            stage: PipelineStage::Monitoring,
            model_version: Some(version),
            experiment_id: Some(experiment.experiment_id),
            validation: Some(report),
            error: None,
        })
    }

    async fn publish_training_failed(&self, model_type: &str, error: &CoreError) {
        publish_best_effort(
            self.events.as_ref(),
            LifecycleEvent::new(LifecycleEventKind::TrainingFailed, model_type)
                .with_detail(serde_json::json!({ "error": error.to_string() })),
        )
        .await;
    }

    fn begin_flight(&self, model_type: &str) -> Result<FlightGuard> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if !in_flight.insert(model_type.to_string()) {
            return Err(CoreError::PipelineBusy {
                model_type: model_type.to_string(),
            });
        }
        Ok(FlightGuard {
            in_flight: self.in_flight.clone(),
            model_type: model_type.to_string(),
        })
    }
}

/// Timestamp-prefixed version label with a short random suffix, unique even
/// for back-to-back training runs.
fn generate_version_label() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("v{}-{}", Utc::now().format("%Y%m%d%H%M%S"), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_labels_are_unique() {
        let a = generate_version_label();
        let b = generate_version_label();
        assert_ne!(a, b);
        assert!(a.starts_with('v'));
    }

    #[test]
    fn test_config_defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.canary_traffic_pct, 10.0);
        assert_eq!(config.emergency_traffic_pct, 50.0);
        assert!(config.trainer_timeout >= Duration::from_secs(1));
    }

    #[test]
    fn test_status_labels() {
        let outcome = PipelineOutcome {
            model_type: "default_prediction".to_string(),
            stage: PipelineStage::Monitoring,
            model_version: Some("v1".to_string()),
            experiment_id: None,
            validation: None,
            error: None,
        };
        assert_eq!(outcome.status_label(), "deployed_for_testing");

        let outcome = PipelineOutcome {
            stage: PipelineStage::Rejected,
            ..outcome
        };
        assert_eq!(outcome.status_label(), "validation_failed");

        let failed = PipelineOutcome::failure(
            "loan_pricing",
            PipelineStage::Training,
            &CoreError::TrainingFailed {
                model_type: "loan_pricing".to_string(),
                reason: "oom".to_string(),
            },
        );
        assert_eq!(failed.status_label(), "training_failed");
    }
}
