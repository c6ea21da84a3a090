//! Traffic routing between baseline and candidate model versions.
//!
//! Each prediction request is routed according to the active experiment for
//! its model family: a uniform draw against the configured traffic split
//! sends it to the candidate ("test") or the baseline ("control"). With no
//! experiment running, all traffic goes to the active version.
//!
//! Loaded model instances are cached per `(model_type, version)` and
//! invalidated explicitly (for example on promotion) rather than polled, so
//! a retired version is never served after rollback. A version whose
//! backing artifact fails to load is skipped in favor of the last
//! known-good version; only when nothing loads at all does the request fail
//! with `ModelUnavailable`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use modelgate_state::{Experiment, ExperimentStore, ModelRegistry, ModelStatus, ModelVersion, StorageError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::obs;
use crate::trainer::{ModelHandle, ModelLoader, Prediction};

/// Which experiment arm served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantLabel {
    /// Baseline (or sole active) version
    Control,
    /// Experiment candidate
    Test,
}

impl VariantLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantLabel::Control => "control",
            VariantLabel::Test => "test",
        }
    }
}

impl std::fmt::Display for VariantLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Routing decision for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutedModel {
    pub model_version: ModelVersion,
    pub variant: VariantLabel,
}

/// Routing decision plus the prediction the routed model produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedPrediction {
    pub model_version: ModelVersion,
    pub variant: VariantLabel,
    pub prediction: Prediction,
}

type CacheKey = (String, String);

/// Per-request traffic router with an explicit per-version model cache.
pub struct TrafficRouter {
    registry: Arc<dyn ModelRegistry>,
    experiments: Arc<dyn ExperimentStore>,
    loader: Arc<dyn ModelLoader>,
    cache: RwLock<HashMap<CacheKey, Arc<dyn ModelHandle>>>,
}

impl TrafficRouter {
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        experiments: Arc<dyn ExperimentStore>,
        loader: Arc<dyn ModelLoader>,
    ) -> Self {
        Self {
            registry,
            experiments,
            loader,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Decide which version serves a request.
    ///
    /// With a stable `request_key` the decision is deterministic (the key is
    /// hashed into the uniform draw); without one a fresh random draw is
    /// made per call, so repeat calls for the same logical request may land
    /// in different variants.
    pub async fn route(
        &self,
        model_type: &str,
        request_key: Option<&str>,
    ) -> Result<RoutedModel> {
        let (model_version, variant, _handle) = self.resolve(model_type, request_key).await?;
        Ok(RoutedModel {
            model_version,
            variant,
        })
    }

    /// Route a request and run the prediction on the routed model.
    pub async fn predict(
        &self,
        model_type: &str,
        features: &serde_json::Value,
        request_key: Option<&str>,
    ) -> Result<RoutedPrediction> {
        let (model_version, variant, handle) = self.resolve(model_type, request_key).await?;
        let prediction = handle.predict(features)?;
        Ok(RoutedPrediction {
            model_version,
            variant,
            prediction,
        })
    }

    /// Drop all cached handles for a model type. Called on promotion or
    /// rollback so stale versions stop serving. In-flight predictions hold
    /// their own `Arc` to the handle and are unaffected.
    pub fn invalidate(&self, model_type: &str) {
        let mut cache = self.cache.write().unwrap();
        cache.retain(|(family, _), _| family != model_type);
        obs::emit_cache_invalidated(model_type);
    }

    async fn resolve(
        &self,
        model_type: &str,
        request_key: Option<&str>,
    ) -> Result<(ModelVersion, VariantLabel, Arc<dyn ModelHandle>)> {
        let experiment = self.latest_active_experiment(model_type).await?;

        let selected = match &experiment {
            Some(exp) => {
                let r = draw(request_key);
                if r < exp.traffic_percentage / 100.0 {
                    exp.candidate_version.clone()
                } else {
                    match &exp.baseline_version {
                        Some(baseline) => baseline.clone(),
                        // Cold-start experiment: no baseline existed, the
                        // candidate is the only servable version.
                        None => exp.candidate_version.clone(),
                    }
                }
            }
            None => {
                self.registry
                    .get_active_version(model_type)
                    .await
                    .map_err(|e| match e {
                        StorageError::NoActiveVersion { model_type } => {
                            CoreError::ModelUnavailable { model_type }
                        }
                        other => CoreError::Storage(other),
                    })?
                    .version
            }
        };

        let chain = self.fallback_chain(model_type, &selected, experiment.as_ref()).await;
        for (i, version) in chain.iter().enumerate() {
            let record = match self.registry.get_version(model_type, version).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        event = "router.version_missing",
                        model_type = %model_type,
                        version = %version,
                        error = %e,
                    );
                    continue;
                }
            };
            match self.handle_for(&record).await {
                Ok(handle) => {
                    if i > 0 {
                        obs::emit_fallback_served(model_type, &selected, version);
                    }
                    let variant = match &experiment {
                        Some(exp) if exp.candidate_version == *version => VariantLabel::Test,
                        _ => VariantLabel::Control,
                    };
                    return Ok((record, variant, handle));
                }
                Err(e) => {
                    // Non-fatal: fall through to the next known-good version.
                    warn!(
                        event = "router.load_failed",
                        model_type = %model_type,
                        version = %version,
                        error = %e,
                    );
                }
            }
        }

        Err(CoreError::ModelUnavailable {
            model_type: model_type.to_string(),
        })
    }

    /// Load order: the selected version, then the experiment baseline or
    /// current active version, then the most recently retired version.
    async fn fallback_chain(
        &self,
        model_type: &str,
        selected: &str,
        experiment: Option<&Experiment>,
    ) -> Vec<String> {
        let mut chain = vec![selected.to_string()];
        let mut push = |v: String, chain: &mut Vec<String>| {
            if !chain.iter().any(|c| c == &v) {
                chain.push(v);
            }
        };

        if let Some(exp) = experiment {
            if let Some(baseline) = &exp.baseline_version {
                push(baseline.clone(), &mut chain);
            }
        }
        if let Ok(active) = self.registry.get_active_version(model_type).await {
            push(active.version, &mut chain);
        }
        if let Ok(versions) = self.registry.list_versions(model_type).await {
            if let Some(retired) = versions.iter().find(|v| v.status == ModelStatus::Retired) {
                push(retired.version.clone(), &mut chain);
            }
        }
        chain
    }

    /// Several active experiments for one model type are tolerated; the one
    /// with the latest start_time wins.
    async fn latest_active_experiment(&self, model_type: &str) -> Result<Option<Experiment>> {
        let active = self.experiments.active_for(model_type).await?;
        Ok(active.into_iter().max_by_key(|e| e.start_time))
    }

    async fn handle_for(&self, version: &ModelVersion) -> Result<Arc<dyn ModelHandle>> {
        let key = (version.model_type.clone(), version.version.clone());
        let cached = {
            let cache = self.cache.read().unwrap();
            cache.get(&key).cloned()
        };
        if let Some(handle) = cached {
            return Ok(handle);
        }
        // Load outside any lock; the write lock is held only for the insert.
        let handle = self.loader.load(version).await?;
        let mut cache = self.cache.write().unwrap();
        Ok(cache.entry(key).or_insert(handle).clone())
    }
}

/// Uniform draw in [0, 1): deterministic from a stable request key when
/// supplied, otherwise a fresh pseudo-random value per request.
fn draw(request_key: Option<&str>) -> f64 {
    match request_key {
        Some(key) => {
            let digest = Sha256::digest(key.as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest[..8]);
            // Top 53 bits give a uniform double in [0, 1).
            (u64::from_be_bytes(bytes) >> 11) as f64 / (1u64 << 53) as f64
        }
        None => rand::thread_rng().gen::<f64>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_draw_is_deterministic() {
        let a = draw(Some("request-42"));
        let b = draw(Some("request-42"));
        assert_eq!(a, b);
        assert!((0.0..1.0).contains(&a));
    }

    #[test]
    fn test_distinct_keys_spread_uniformly() {
        let n = 10_000;
        let hits = (0..n)
            .filter(|i| draw(Some(&format!("req-{}", i))) < 0.25)
            .count();
        let rate = hits as f64 / n as f64;
        assert!((rate - 0.25).abs() < 0.02, "rate = {}", rate);
    }

    #[test]
    fn test_random_draw_in_unit_interval() {
        for _ in 0..1000 {
            let r = draw(None);
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_variant_label_strings() {
        assert_eq!(VariantLabel::Control.as_str(), "control");
        assert_eq!(VariantLabel::Test.as_str(), "test");
    }
}
