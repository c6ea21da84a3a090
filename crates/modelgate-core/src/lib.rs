//! Modelgate Core Library
//!
//! Control core for the ML model lifecycle: training orchestration,
//! validation gating, canary traffic routing, live performance monitoring,
//! experiment analysis, and promotion. Persistence lives behind the
//! `modelgate-state` traits; model training and serving live behind the
//! [`trainer`] capability traits.

pub mod analyzer;
pub mod drift;
pub mod error;
pub mod events;
pub mod fakes;
pub mod lifecycle;
pub mod metrics;
pub mod monitor;
pub mod obs;
pub mod query;
pub mod router;
pub mod stats;
pub mod telemetry;
pub mod trainer;
pub mod validation;

pub use analyzer::{
    AnalysisConfig, AnalysisReport, ExperimentAnalyzer, Recommendation, VariantPerformance,
};
pub use drift::drift_score;
pub use error::{CoreError, Result};
pub use events::{
    publish_best_effort, EventSink, FailingEventSink, LifecycleEvent, LifecycleEventKind,
    MemoryEventSink,
};
pub use lifecycle::{
    AnalysisAction, AnalysisDecision, LifecycleConfig, LifecycleController, PipelineOutcome,
    PipelineStage, Priority,
};
pub use metrics::{MemoryMetricSink, MetricSink, NullMetricSink};
pub use monitor::{
    analyze_recent, AlertSeverity, AlertThresholds, PerformanceAlert, PerformanceMonitor,
};
pub use query::{DashboardQueries, ModelLineage, PerformanceSummary};
pub use router::{RoutedModel, RoutedPrediction, TrafficRouter, VariantLabel};
pub use trainer::{
    HyperParameters, ModelHandle, ModelLoader, ModelTrainer, Prediction, TrainedModel,
};
pub use validation::{validate_model, CheckResult, ValidationConfig, ValidationReport};

pub use modelgate_state::{
    AuditEntry, CloseReason, Experiment, ExperimentId, ExperimentStatus, ExperimentStore,
    FeatureStats, ModelMetrics, ModelRegistry, ModelStatus, ModelVersion, PerformanceLedger,
    PerformanceSample, SampleOutcome, StorageError,
};

pub use obs::{
    emit_cache_invalidated, emit_experiment_started, emit_fallback_served, emit_pipeline_started,
    emit_promotion, emit_sample_dropped, emit_validation_failed, emit_version_registered, flow_span,
};
pub use telemetry::init_tracing;
