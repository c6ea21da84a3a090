//! External trainer/predictor capability traits.
//!
//! Training algorithm internals are out of scope for the core: the
//! lifecycle controller consumes a [`ModelTrainer`] to produce candidate
//! artifacts, and the router consumes a [`ModelLoader`] to turn registered
//! versions into servable [`ModelHandle`]s. Both are implementable over any
//! storage/compute backend; in-memory fakes live in [`crate::fakes`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use modelgate_state::{FeatureStats, ModelMetrics, ModelVersion};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Hyperparameter budget handed to the external trainer.
///
/// The named fields cover the knobs the lifecycle controller itself
/// adjusts (emergency retraining shrinks the budget for faster
/// turnaround); everything else rides along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParameters {
    pub n_estimators: u32,
    pub max_depth: u32,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for HyperParameters {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 15,
            extra: HashMap::new(),
        }
    }
}

impl HyperParameters {
    /// Reduced budget for emergency retraining: faster turnaround over
    /// marginal quality.
    pub fn emergency() -> Self {
        Self {
            n_estimators: 50,
            max_depth: 10,
            extra: HashMap::new(),
        }
    }
}

/// Output of a completed training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Opaque handle to the stored artifact
    pub storage_path: String,
    /// Held-out evaluation metrics
    pub metrics: ModelMetrics,
    /// Training-time feature distributions, carried into the registry
    /// record for later drift scoring
    pub training_stats: HashMap<String, FeatureStats>,
}

/// A prediction produced by a servable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted label or value
    pub label: serde_json::Value,
    /// Per-class probabilities (empty for regression)
    #[serde(default)]
    pub probabilities: Vec<f64>,
}

/// External model trainer capability.
#[async_trait]
pub trait ModelTrainer: Send + Sync {
    /// Train a new candidate for `model_type` from the given dataset handle.
    async fn train(
        &self,
        model_type: &str,
        dataset: &str,
        hyperparameters: &HyperParameters,
    ) -> Result<TrainedModel>;
}

/// A loaded, servable model instance.
pub trait ModelHandle: Send + Sync {
    /// Run one prediction over a feature map.
    fn predict(&self, features: &serde_json::Value) -> Result<Prediction>;
}

/// External model loader capability: turns a registered version into a
/// servable handle (e.g. by fetching and deserializing the artifact).
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Load the backing artifact for a version. Failures are non-fatal to
    /// the router, which falls back to the last known-good version.
    async fn load(&self, version: &ModelVersion) -> Result<Arc<dyn ModelHandle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget_larger_than_emergency() {
        let default = HyperParameters::default();
        let emergency = HyperParameters::emergency();
        assert!(emergency.n_estimators < default.n_estimators);
        assert!(emergency.max_depth < default.max_depth);
    }

    #[test]
    fn test_hyperparameters_serde_roundtrip() {
        let mut hp = HyperParameters::default();
        hp.extra
            .insert("min_samples_leaf".to_string(), serde_json::json!(4));

        let json = serde_json::to_string(&hp).expect("serialize");
        let back: HyperParameters = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(hp, back);
    }
}
