//! Traffic router integration tests: split accuracy, fallback behavior,
//! and cache invalidation, all against the in-memory fakes.

use std::sync::Arc;

use chrono::Utc;
use modelgate_core::fakes::FakeModelLoader;
use modelgate_core::{CoreError, TrafficRouter, VariantLabel};
use modelgate_state::fakes::{MemoryExperimentStore, MemoryModelRegistry};
use modelgate_state::{
    Experiment, ExperimentId, ExperimentStatus, ExperimentStore, ModelMetrics, ModelRegistry,
    ModelStatus, ModelVersion,
};

fn version(model_type: &str, version: &str, status: ModelStatus) -> ModelVersion {
    ModelVersion {
        model_type: model_type.to_string(),
        version: version.to_string(),
        storage_path: format!("models/{}/{}/", model_type, version),
        created_at: Utc::now(),
        status,
        traffic_percentage: 0.0,
        metrics: ModelMetrics::default(),
        training_stats: Default::default(),
    }
}

struct Harness {
    registry: Arc<MemoryModelRegistry>,
    experiments: Arc<MemoryExperimentStore>,
    loader: Arc<FakeModelLoader>,
    router: TrafficRouter,
}

fn harness() -> Harness {
    let registry = Arc::new(MemoryModelRegistry::new());
    let experiments = Arc::new(MemoryExperimentStore::new());
    let loader = Arc::new(FakeModelLoader::new());
    let router = TrafficRouter::new(registry.clone(), experiments.clone(), loader.clone());
    Harness {
        registry,
        experiments,
        loader,
        router,
    }
}

async fn seed_experiment(h: &Harness, traffic_percentage: f64) {
    h.registry
        .register(version("default_prediction", "v1", ModelStatus::Active))
        .await
        .unwrap();
    h.registry
        .register(version("default_prediction", "v2", ModelStatus::Shadow))
        .await
        .unwrap();
    h.experiments
        .create(Experiment {
            experiment_id: ExperimentId("exp-1".to_string()),
            model_type: "default_prediction".to_string(),
            candidate_version: "v2".to_string(),
            baseline_version: Some("v1".to_string()),
            traffic_percentage,
            start_time: Utc::now(),
            status: ExperimentStatus::Active,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn no_experiment_routes_everything_to_active() {
    let h = harness();
    h.registry
        .register(version("default_prediction", "v1", ModelStatus::Active))
        .await
        .unwrap();

    for i in 0..50 {
        let routed = h
            .router
            .route("default_prediction", Some(&format!("req-{}", i)))
            .await
            .unwrap();
        assert_eq!(routed.model_version.version, "v1");
        assert_eq!(routed.variant, VariantLabel::Control);
    }
}

#[tokio::test]
async fn zero_percent_experiment_serves_only_baseline() {
    let h = harness();
    seed_experiment(&h, 0.0).await;

    for i in 0..100 {
        let routed = h
            .router
            .route("default_prediction", Some(&format!("req-{}", i)))
            .await
            .unwrap();
        assert_eq!(routed.model_version.version, "v1");
        assert_eq!(routed.variant, VariantLabel::Control);
    }
}

#[tokio::test]
async fn hundred_percent_experiment_serves_only_candidate() {
    let h = harness();
    seed_experiment(&h, 100.0).await;

    for i in 0..100 {
        let routed = h
            .router
            .route("default_prediction", Some(&format!("req-{}", i)))
            .await
            .unwrap();
        assert_eq!(routed.model_version.version, "v2");
        assert_eq!(routed.variant, VariantLabel::Test);
    }
}

#[tokio::test]
async fn ten_percent_split_converges_over_many_requests() {
    let h = harness();
    seed_experiment(&h, 10.0).await;

    let n = 10_000;
    let mut candidate_hits = 0;
    for i in 0..n {
        let routed = h
            .router
            .route("default_prediction", Some(&format!("req-{}", i)))
            .await
            .unwrap();
        if routed.variant == VariantLabel::Test {
            candidate_hits += 1;
        }
    }
    let rate = candidate_hits as f64 / n as f64;
    assert!((rate - 0.10).abs() < 0.02, "candidate rate = {}", rate);
}

#[tokio::test]
async fn stable_request_key_always_lands_in_same_variant() {
    let h = harness();
    seed_experiment(&h, 50.0).await;

    let first = h
        .router
        .route("default_prediction", Some("customer-7781"))
        .await
        .unwrap();
    for _ in 0..20 {
        let again = h
            .router
            .route("default_prediction", Some("customer-7781"))
            .await
            .unwrap();
        assert_eq!(again.variant, first.variant);
        assert_eq!(again.model_version.version, first.model_version.version);
    }
}

#[tokio::test]
async fn candidate_load_failure_falls_back_to_baseline() {
    let h = harness();
    seed_experiment(&h, 100.0).await;
    h.loader.fail_version("default_prediction", "v2");

    let routed = h
        .router
        .predict(
            "default_prediction",
            &serde_json::json!({"income": 50_000}),
            Some("req-1"),
        )
        .await
        .unwrap();
    // The baseline actually served, so the request is not a test sample.
    assert_eq!(routed.model_version.version, "v1");
    assert_eq!(routed.variant, VariantLabel::Control);
    assert_eq!(routed.prediction.label, serde_json::json!("v1"));
}

#[tokio::test]
async fn nothing_loadable_is_model_unavailable() {
    let h = harness();
    seed_experiment(&h, 100.0).await;
    h.loader.fail_version("default_prediction", "v1");
    h.loader.fail_version("default_prediction", "v2");

    let err = h
        .router
        .route("default_prediction", Some("req-1"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ModelUnavailable { .. }));
}

#[tokio::test]
async fn cold_registry_is_model_unavailable() {
    let h = harness();
    let err = h.router.route("default_prediction", None).await.unwrap_err();
    assert!(matches!(err, CoreError::ModelUnavailable { .. }));
}

#[tokio::test]
async fn handles_are_cached_until_invalidated() {
    let h = harness();
    h.registry
        .register(version("default_prediction", "v1", ModelStatus::Active))
        .await
        .unwrap();

    for _ in 0..5 {
        h.router.route("default_prediction", None).await.unwrap();
    }
    assert_eq!(h.loader.load_count(), 1);

    h.router.invalidate("default_prediction");
    h.router.route("default_prediction", None).await.unwrap();
    assert_eq!(h.loader.load_count(), 2);
}

#[tokio::test]
async fn invalidation_is_scoped_to_one_model_type() {
    let h = harness();
    h.registry
        .register(version("default_prediction", "v1", ModelStatus::Active))
        .await
        .unwrap();
    h.registry
        .register(version("loan_pricing", "v1", ModelStatus::Active))
        .await
        .unwrap();
    h.router.route("default_prediction", None).await.unwrap();
    h.router.route("loan_pricing", None).await.unwrap();
    assert_eq!(h.loader.load_count(), 2);

    h.router.invalidate("default_prediction");
    h.router.route("loan_pricing", None).await.unwrap();
    // loan_pricing handle survived the flush.
    assert_eq!(h.loader.load_count(), 2);
}

#[tokio::test]
async fn cold_start_experiment_serves_candidate_on_both_sides_of_split() {
    let h = harness();
    h.registry
        .register(version("default_prediction", "v1", ModelStatus::Shadow))
        .await
        .unwrap();
    h.experiments
        .create(Experiment {
            experiment_id: ExperimentId("exp-cold".to_string()),
            model_type: "default_prediction".to_string(),
            candidate_version: "v1".to_string(),
            baseline_version: None,
            traffic_percentage: 10.0,
            start_time: Utc::now(),
            status: ExperimentStatus::Active,
        })
        .await
        .unwrap();

    for i in 0..50 {
        let routed = h
            .router
            .route("default_prediction", Some(&format!("req-{}", i)))
            .await
            .unwrap();
        assert_eq!(routed.model_version.version, "v1");
    }
}
