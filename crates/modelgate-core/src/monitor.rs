//! Real-time performance monitoring hook.
//!
//! Called on every served prediction for which ground truth (or a usable
//! confidence signal) is known. Monitoring must never fail the business
//! request: ledger append errors are swallowed and logged, metric pushes
//! and alert events are best-effort.

use std::sync::Arc;

use chrono::{Duration, Utc};
use modelgate_state::{ModelVersion, PerformanceLedger, PerformanceSample, SampleOutcome};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::drift::drift_score;
use crate::events::{publish_best_effort, EventSink, LifecycleEvent, LifecycleEventKind};
use crate::metrics::MetricSink;
use crate::obs;

/// Degradation thresholds for live performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Recent accuracy below this raises a warning
    pub min_accuracy: f64,
    /// Recent accuracy below this raises a critical alert
    pub critical_accuracy: f64,
    /// Recent mean drift above this raises a warning
    pub max_drift: f64,
    /// Recent mean drift above this raises a critical alert
    pub critical_drift: f64,
    /// Number of most recent samples aggregated for trend checks
    pub recent_window: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            min_accuracy: 0.85,
            critical_accuracy: 0.80,
            max_drift: 2.0,
            critical_drift: 3.0,
            recent_window: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

/// One detected degradation signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAlert {
    pub model_version: String,
    /// "low_accuracy" or "feature_drift"
    pub kind: String,
    pub severity: AlertSeverity,
    pub value: f64,
    pub threshold: f64,
}

impl PerformanceAlert {
    pub fn is_critical(&self) -> bool {
        self.severity == AlertSeverity::Critical
    }
}

/// Monitoring hook feeding the performance ledger, metric sink, and alerting.
pub struct PerformanceMonitor {
    ledger: Arc<dyn PerformanceLedger>,
    events: Arc<dyn EventSink>,
    metrics: Arc<dyn MetricSink>,
    thresholds: AlertThresholds,
}

impl PerformanceMonitor {
    pub fn new(
        ledger: Arc<dyn PerformanceLedger>,
        events: Arc<dyn EventSink>,
        metrics: Arc<dyn MetricSink>,
        thresholds: AlertThresholds,
    ) -> Self {
        Self {
            ledger,
            events,
            metrics,
            thresholds,
        }
    }

    /// Record one observed outcome for a served prediction.
    ///
    /// Infallible by contract: a failed append drops the sample with a
    /// warning instead of surfacing to the prediction path. Returns any
    /// degradation alerts found over the recent window so the caller can
    /// react (e.g. trigger emergency retraining on criticals).
    pub async fn observe(
        &self,
        served_by: &ModelVersion,
        outcome: SampleOutcome,
        raw_features: serde_json::Value,
        raw_actual: serde_json::Value,
        raw_predicted: serde_json::Value,
    ) -> Vec<PerformanceAlert> {
        let drift = drift_score(&raw_features, &served_by.training_stats);
        let sample = PerformanceSample {
            model_version: served_by.version.clone(),
            timestamp: Utc::now(),
            outcome: outcome.clone(),
            drift_score: drift,
            raw_features,
            raw_actual,
            raw_predicted,
        };

        if let Err(e) = self.ledger.record(sample).await {
            obs::emit_sample_dropped(&served_by.version, &e);
        }

        match &outcome {
            SampleOutcome::Correctness(correct) => {
                self.metrics.push_gauge(
                    &served_by.version,
                    "prediction_accuracy",
                    if *correct { 1.0 } else { 0.0 },
                );
            }
            SampleOutcome::Error(err) => {
                self.metrics
                    .push_gauge(&served_by.version, "prediction_error", *err);
            }
        }
        self.metrics
            .push_gauge(&served_by.version, "drift_score", drift);

        let alerts = self.check_recent_trends(served_by).await;
        for alert in &alerts {
            publish_best_effort(
                self.events.as_ref(),
                LifecycleEvent::new(LifecycleEventKind::PerformanceAlert, &served_by.model_type)
                    .with_version(&served_by.version)
                    .with_detail(serde_json::json!({
                        "kind": alert.kind,
                        "severity": alert.severity,
                        "value": alert.value,
                        "threshold": alert.threshold,
                    })),
            )
            .await;
        }
        alerts
    }

    async fn check_recent_trends(&self, served_by: &ModelVersion) -> Vec<PerformanceAlert> {
        let since = Utc::now() - Duration::days(1);
        let samples = match self.ledger.query(&served_by.version, since).await {
            Ok(samples) => samples,
            Err(e) => {
                warn!(
                    event = "monitor.trend_query_failed",
                    model_version = %served_by.version,
                    error = %e,
                );
                return Vec::new();
            }
        };
        analyze_recent(&served_by.version, &samples, &self.thresholds)
    }
}

/// Evaluate degradation thresholds over the most recent samples.
pub fn analyze_recent(
    model_version: &str,
    samples: &[PerformanceSample],
    thresholds: &AlertThresholds,
) -> Vec<PerformanceAlert> {
    let window = samples
        .iter()
        .rev()
        .take(thresholds.recent_window)
        .collect::<Vec<_>>();
    if window.is_empty() {
        return Vec::new();
    }

    let mut alerts = Vec::new();

    let correctness: Vec<bool> = window
        .iter()
        .filter_map(|s| match s.outcome {
            SampleOutcome::Correctness(c) => Some(c),
            SampleOutcome::Error(_) => None,
        })
        .collect();
    if !correctness.is_empty() {
        let recent_accuracy =
            correctness.iter().filter(|c| **c).count() as f64 / correctness.len() as f64;
        if recent_accuracy < thresholds.min_accuracy {
            alerts.push(PerformanceAlert {
                model_version: model_version.to_string(),
                kind: "low_accuracy".to_string(),
                severity: if recent_accuracy < thresholds.critical_accuracy {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                },
                value: recent_accuracy,
                threshold: thresholds.min_accuracy,
            });
        }
    }

    let recent_drift =
        window.iter().map(|s| s.drift_score).sum::<f64>() / window.len() as f64;
    if recent_drift > thresholds.max_drift {
        alerts.push(PerformanceAlert {
            model_version: model_version.to_string(),
            kind: "feature_drift".to_string(),
            severity: if recent_drift > thresholds.critical_drift {
                AlertSeverity::Critical
            } else {
                AlertSeverity::Warning
            },
            value: recent_drift,
            threshold: thresholds.max_drift,
        });
    }

    alerts
}
