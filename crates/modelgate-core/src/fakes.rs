//! In-memory fakes for the external trainer/loader capabilities (testing only)
//!
//! `FakeTrainer` returns a scripted `TrainedModel`, optionally after a
//! delay or as a failure. `FakeModelLoader` produces `FakeModelHandle`s and
//! can be told to fail loads for specific versions, which exercises the
//! router's fallback path.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use modelgate_state::{FeatureStats, ModelMetrics, ModelVersion};

use crate::error::{CoreError, Result};
use crate::trainer::{HyperParameters, ModelHandle, ModelLoader, ModelTrainer, Prediction, TrainedModel};

/// A healthy classification training result that passes every validation
/// check with the default thresholds.
pub fn healthy_trained_model() -> TrainedModel {
    let mut feature_importance = HashMap::new();
    feature_importance.insert("income".to_string(), 0.35);
    feature_importance.insert("credit_score".to_string(), 0.35);
    feature_importance.insert("ltv".to_string(), 0.30);

    let mut training_stats = HashMap::new();
    training_stats.insert(
        "income".to_string(),
        FeatureStats {
            mean: 72_000.0,
            std: 21_000.0,
        },
    );
    training_stats.insert(
        "credit_score".to_string(),
        FeatureStats {
            mean: 690.0,
            std: 55.0,
        },
    );
    training_stats.insert(
        "ltv".to_string(),
        FeatureStats {
            mean: 0.78,
            std: 0.12,
        },
    );

    TrainedModel {
        storage_path: "models/fake/".to_string(),
        metrics: ModelMetrics {
            accuracy: Some(0.91),
            precision: Some(0.90),
            recall: Some(0.89),
            f1_score: Some(0.895),
            cross_val_scores: vec![0.90, 0.91, 0.92, 0.90, 0.91],
            feature_importance,
            training_secs: Some(42.0),
            model_size_bytes: Some(30 * 1024 * 1024),
            ..Default::default()
        },
        training_stats,
    }
}

enum TrainerScript {
    Succeed(TrainedModel),
    Fail(String),
}

/// Scripted trainer fake.
pub struct FakeTrainer {
    script: TrainerScript,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, String, HyperParameters)>>,
}

impl FakeTrainer {
    /// Always returns [`healthy_trained_model`].
    pub fn healthy() -> Self {
        Self::returning(healthy_trained_model())
    }

    pub fn returning(model: TrainedModel) -> Self {
        Self {
            script: TrainerScript::Succeed(model),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            script: TrainerScript::Fail(reason.into()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering, for timeout tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(model_type, dataset, hyperparameters)` per train call, in order.
    pub fn calls(&self) -> Vec<(String, String, HyperParameters)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelTrainer for FakeTrainer {
    async fn train(
        &self,
        model_type: &str,
        dataset: &str,
        hyperparameters: &HyperParameters,
    ) -> Result<TrainedModel> {
        self.calls.lock().unwrap().push((
            model_type.to_string(),
            dataset.to_string(),
            hyperparameters.clone(),
        ));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            TrainerScript::Succeed(model) => {
                let mut model = model.clone();
                model.storage_path = format!("models/{}/", model_type);
                Ok(model)
            }
            TrainerScript::Fail(reason) => Err(CoreError::TrainingFailed {
                model_type: model_type.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Servable fake model: answers every request with its own version label.
pub struct FakeModelHandle {
    version: String,
}

impl ModelHandle for FakeModelHandle {
    fn predict(&self, _features: &serde_json::Value) -> Result<Prediction> {
        Ok(Prediction {
            label: serde_json::Value::String(self.version.clone()),
            probabilities: vec![0.8, 0.2],
        })
    }
}

/// Loader fake with per-version failure injection and a load counter.
#[derive(Default)]
pub struct FakeModelLoader {
    failing: Mutex<HashSet<String>>,
    loads: AtomicUsize,
}

impl FakeModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make loads of `model_type/version` fail from now on.
    pub fn fail_version(&self, model_type: &str, version: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(format!("{}/{}", model_type, version));
    }

    /// Allow loads of `model_type/version` again.
    pub fn restore_version(&self, model_type: &str, version: &str) {
        self.failing
            .lock()
            .unwrap()
            .remove(&format!("{}/{}", model_type, version));
    }

    /// Total successful loads (cache misses) so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for FakeModelLoader {
    async fn load(&self, version: &ModelVersion) -> Result<Arc<dyn ModelHandle>> {
        let key = format!("{}/{}", version.model_type, version.version);
        if self.failing.lock().unwrap().contains(&key) {
            return Err(CoreError::ModelLoadFailed {
                model_type: version.model_type.clone(),
                version: version.version.clone(),
                reason: "artifact fetch failed".to_string(),
            });
        }
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeModelHandle {
            version: version.version.clone(),
        }))
    }
}
