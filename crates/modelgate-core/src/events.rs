//! Lifecycle event publishing.
//!
//! Events are fire-and-forget notifications of lifecycle milestones for
//! downstream consumers (dashboards, alerting, sibling services). Delivery
//! is best-effort: a failing sink is logged and never fails the operation
//! that triggered the event.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Kinds of lifecycle events the core publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
    TrainingStarted,
    TrainingFailed,
    ModelDeployedForTesting,
    ModelPromoted,
    ValidationFailed,
    PerformanceAlert,
    EmergencyRetrainingTriggered,
}

/// One lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub kind: LifecycleEventKind,
    pub model_type: String,
    pub model_version: Option<String>,
    pub experiment_id: Option<String>,
    /// Event-specific payload
    pub detail: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(kind: LifecycleEventKind, model_type: impl Into<String>) -> Self {
        Self {
            kind,
            model_type: model_type.into(),
            model_version: None,
            experiment_id: None,
            detail: serde_json::json!({}),
            timestamp: Utc::now(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = Some(version.into());
        self
    }

    pub fn with_experiment(mut self, experiment_id: impl Into<String>) -> Self {
        self.experiment_id = Some(experiment_id.into());
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

/// Event notification sink capability.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish one event. Implementations may fail; callers use
    /// [`publish_best_effort`] so delivery failure never propagates.
    async fn publish(&self, event: LifecycleEvent) -> anyhow::Result<()>;
}

/// Publish an event, swallowing and logging any delivery failure.
pub async fn publish_best_effort(sink: &dyn EventSink, event: LifecycleEvent) {
    let kind = event.kind;
    let model_type = event.model_type.clone();
    if let Err(e) = sink.publish(event).await {
        warn!(
            event = "events.publish_failed",
            kind = ?kind,
            model_type = %model_type,
            error = %e,
        );
    }
}

/// In-memory event sink for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events of one kind, in publish order.
    pub fn of_kind(&self, kind: LifecycleEventKind) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn publish(&self, event: LifecycleEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Sink that always fails delivery. Used to verify best-effort semantics.
#[derive(Debug, Default)]
pub struct FailingEventSink;

#[async_trait]
impl EventSink for FailingEventSink {
    async fn publish(&self, _event: LifecycleEvent) -> anyhow::Result<()> {
        anyhow::bail!("event bus unreachable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_records_events() {
        let sink = MemoryEventSink::new();
        publish_best_effort(
            &sink,
            LifecycleEvent::new(LifecycleEventKind::TrainingStarted, "default_prediction"),
        )
        .await;

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, LifecycleEventKind::TrainingStarted);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_propagate() {
        let sink = FailingEventSink;
        // Must not panic or return an error path to the caller.
        publish_best_effort(
            &sink,
            LifecycleEvent::new(LifecycleEventKind::ModelPromoted, "loan_pricing"),
        )
        .await;
    }

    #[test]
    fn test_builder_fields() {
        let event = LifecycleEvent::new(
            LifecycleEventKind::ModelDeployedForTesting,
            "default_prediction",
        )
        .with_version("v20240101")
        .with_experiment("exp-1")
        .with_detail(serde_json::json!({"traffic_percentage": 10.0}));

        assert_eq!(event.model_version.as_deref(), Some("v20240101"));
        assert_eq!(event.experiment_id.as_deref(), Some("exp-1"));
        assert_eq!(event.detail["traffic_percentage"], 10.0);
    }
}
