//! Structured observability hooks for model lifecycle events.
//!
//! This module provides:
//! - Flow-scoped tracing spans via [`flow_span`]
//! - Emission functions for key lifecycle events: pipeline start,
//!   registration, validation verdicts, experiment start, promotion,
//!   routing fallbacks
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).
//! For JSON output, pass `json = true` to [`crate::telemetry::init_tracing`].

use tracing::{info, warn, Span};

/// Span covering one lifecycle flow. The controller instruments the whole
/// pipeline future with it, so every event inside carries the model type.
pub fn flow_span(model_type: &str) -> Span {
    tracing::info_span!("modelgate.flow", model_type = %model_type)
}

/// Emit event: a training pipeline started for a model type.
pub fn emit_pipeline_started(model_type: &str, priority: &str) {
    info!(event = "pipeline.started", model_type = %model_type, priority = %priority);
}

/// Emit event: a freshly trained candidate was registered.
pub fn emit_version_registered(model_type: &str, version: &str) {
    info!(event = "registry.version_registered", model_type = %model_type, version = %version);
}

/// Emit event: validation rejected a candidate (warning level).
pub fn emit_validation_failed(model_type: &str, version: &str, failed_checks: &[String]) {
    warn!(
        event = "validation.failed",
        model_type = %model_type,
        version = %version,
        failed_checks = ?failed_checks,
    );
}

/// Emit event: a canary experiment started.
pub fn emit_experiment_started(
    model_type: &str,
    experiment_id: &str,
    candidate_version: &str,
    traffic_percentage: f64,
) {
    info!(
        event = "experiment.started",
        model_type = %model_type,
        experiment_id = %experiment_id,
        candidate_version = %candidate_version,
        traffic_percentage = traffic_percentage,
    );
}

/// Emit event: a candidate was promoted to active.
pub fn emit_promotion(model_type: &str, version: &str, improvement: f64, p_value: f64) {
    info!(
        event = "lifecycle.promoted",
        model_type = %model_type,
        version = %version,
        improvement = improvement,
        p_value = p_value,
    );
}

/// Emit event: the router cache was flushed for a model type.
pub fn emit_cache_invalidated(model_type: &str) {
    info!(event = "router.cache_invalidated", model_type = %model_type);
}

/// Emit event: a request was served by a fallback version (warning level).
pub fn emit_fallback_served(model_type: &str, selected: &str, served: &str) {
    warn!(
        event = "router.fallback_served",
        model_type = %model_type,
        selected = %selected,
        served = %served,
    );
}

/// Emit event: a performance sample could not be persisted (warning level).
pub fn emit_sample_dropped(model_version: &str, error: &dyn std::fmt::Display) {
    warn!(event = "monitor.sample_dropped", model_version = %model_version, error = %error);
}
