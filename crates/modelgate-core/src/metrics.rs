//! Best-effort metric gauges per model version.
//!
//! The monitoring hook pushes named numeric gauges (accuracy, error, drift)
//! to an external metrics/alerting backend. Pushes are fire-and-forget and
//! must never block or fail the request path.

use std::sync::Mutex;

/// Metrics sink capability: named numeric gauges per model version.
pub trait MetricSink: Send + Sync {
    /// Push one gauge value. Implementations swallow their own failures.
    fn push_gauge(&self, model_version: &str, name: &str, value: f64);
}

/// Sink that drops all metrics. Default for deployments without a backend.
#[derive(Debug, Default)]
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn push_gauge(&self, _model_version: &str, _name: &str, _value: f64) {}
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemoryMetricSink {
    gauges: Mutex<Vec<(String, String, f64)>>,
}

impl MemoryMetricSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(model_version, name, value)` pushes so far.
    pub fn gauges(&self) -> Vec<(String, String, f64)> {
        self.gauges.lock().unwrap().clone()
    }
}

impl MetricSink for MemoryMetricSink {
    fn push_gauge(&self, model_version: &str, name: &str, value: f64) {
        self.gauges
            .lock()
            .unwrap()
            .push((model_version.to_string(), name.to_string(), value));
    }
}
