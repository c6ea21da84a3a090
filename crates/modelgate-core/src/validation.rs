//! Automated pre-deployment validation.
//!
//! Every candidate passes through five named checks before it may serve
//! canary traffic. The report is transient: it is published as an audit
//! event and logged, never persisted as its own record.

use modelgate_state::{ModelMetrics, ModelVersion};
use serde::{Deserialize, Serialize};

/// Check names, in evaluation order.
pub const PERFORMANCE_THRESHOLD: &str = "performance_threshold";
pub const FEATURE_COMPATIBILITY: &str = "feature_compatibility";
pub const SIZE_LIMIT: &str = "size_limit";
pub const BIAS_CHECK: &str = "bias_check";
pub const STABILITY_CHECK: &str = "stability_check";

/// Thresholds for the validation checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum held-out accuracy for classification models
    pub min_accuracy: f64,
    /// Minimum held-out r² for regression models
    pub min_r2: f64,
    /// Maximum serialized artifact size
    pub max_model_size_bytes: u64,
    /// A single feature may not dominate importance beyond this share
    pub max_importance_share: f64,
    /// Maximum standard deviation across cross-validation folds
    pub max_cross_val_std: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_accuracy: 0.85,
            min_r2: 0.6,
            max_model_size_bytes: 256 * 1024 * 1024,
            max_importance_share: 0.5,
            max_cross_val_std: 0.05,
        }
    }
}

/// Result of one named check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
}

/// Mapping of named checks to pass/fail for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub model_type: String,
    pub version: String,
    pub checks: Vec<CheckResult>,
}

impl ValidationReport {
    /// All checks must pass.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Names of the failing checks, in evaluation order.
    pub fn failed_checks(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Run all validation checks against a registered candidate.
pub fn validate_model(candidate: &ModelVersion, config: &ValidationConfig) -> ValidationReport {
    let metrics = &candidate.metrics;
    let checks = vec![
        CheckResult {
            name: PERFORMANCE_THRESHOLD.to_string(),
            passed: performance_threshold(metrics, config),
        },
        CheckResult {
            name: FEATURE_COMPATIBILITY.to_string(),
            passed: feature_compatibility(candidate),
        },
        CheckResult {
            name: SIZE_LIMIT.to_string(),
            passed: size_limit(metrics, config),
        },
        CheckResult {
            name: BIAS_CHECK.to_string(),
            passed: bias_check(metrics, config),
        },
        CheckResult {
            name: STABILITY_CHECK.to_string(),
            passed: stability_check(metrics, config),
        },
    ];

    ValidationReport {
        model_type: candidate.model_type.clone(),
        version: candidate.version.clone(),
        checks,
    }
}

/// Held-out performance must clear the family-appropriate threshold.
/// A candidate with neither metric is unevaluated and fails.
fn performance_threshold(metrics: &ModelMetrics, config: &ValidationConfig) -> bool {
    match (metrics.accuracy, metrics.r2_score) {
        (Some(acc), _) => acc >= config.min_accuracy,
        (None, Some(r2)) => r2 >= config.min_r2,
        (None, None) => false,
    }
}

/// Every feature the model relies on must carry training statistics,
/// otherwise drift scoring is blind for that feature in production.
fn feature_compatibility(candidate: &ModelVersion) -> bool {
    !candidate.training_stats.is_empty()
        && candidate
            .metrics
            .feature_importance
            .keys()
            .all(|name| candidate.training_stats.contains_key(name))
}

/// Unknown size passes: the check can only be applied when reported.
fn size_limit(metrics: &ModelMetrics, config: &ValidationConfig) -> bool {
    metrics
        .model_size_bytes
        .map_or(true, |size| size <= config.max_model_size_bytes)
}

/// A single dominant feature is a bias/leakage signal.
fn bias_check(metrics: &ModelMetrics, config: &ValidationConfig) -> bool {
    metrics
        .feature_importance
        .values()
        .all(|&share| share <= config.max_importance_share)
}

/// Cross-validation folds must agree with each other.
fn stability_check(metrics: &ModelMetrics, config: &ValidationConfig) -> bool {
    let scores = &metrics.cross_val_scores;
    if scores.len() < 2 {
        return true;
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let std = (scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
    std <= config.max_cross_val_std
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use modelgate_state::{FeatureStats, ModelStatus};
    use std::collections::HashMap;

    fn candidate_with(metrics: ModelMetrics) -> ModelVersion {
        let mut training_stats = HashMap::new();
        for name in metrics.feature_importance.keys() {
            training_stats.insert(
                name.clone(),
                FeatureStats {
                    mean: 0.0,
                    std: 1.0,
                },
            );
        }
        if training_stats.is_empty() {
            training_stats.insert(
                "income".to_string(),
                FeatureStats {
                    mean: 0.0,
                    std: 1.0,
                },
            );
        }
        ModelVersion {
            model_type: "default_prediction".to_string(),
            version: "v1".to_string(),
            storage_path: "models/default_prediction/v1/".to_string(),
            created_at: Utc::now(),
            status: ModelStatus::Training,
            traffic_percentage: 0.0,
            metrics,
            training_stats,
        }
    }

    fn healthy_metrics() -> ModelMetrics {
        let mut feature_importance = HashMap::new();
        feature_importance.insert("income".to_string(), 0.3);
        feature_importance.insert("credit_score".to_string(), 0.35);
        feature_importance.insert("ltv".to_string(), 0.35);
        ModelMetrics {
            accuracy: Some(0.91),
            cross_val_scores: vec![0.90, 0.91, 0.92, 0.90, 0.91],
            feature_importance,
            model_size_bytes: Some(40 * 1024 * 1024),
            ..Default::default()
        }
    }

    #[test]
    fn test_healthy_candidate_passes_all_checks() {
        let report = validate_model(&candidate_with(healthy_metrics()), &Default::default());
        assert!(report.passed(), "failed: {:?}", report.failed_checks());
        assert_eq!(report.checks.len(), 5);
    }

    #[test]
    fn test_low_accuracy_fails_performance_threshold() {
        let mut metrics = healthy_metrics();
        metrics.accuracy = Some(0.70);
        let report = validate_model(&candidate_with(metrics), &Default::default());
        assert_eq!(report.failed_checks(), vec![PERFORMANCE_THRESHOLD]);
    }

    #[test]
    fn test_regression_candidate_uses_r2() {
        let mut metrics = healthy_metrics();
        metrics.accuracy = None;
        metrics.r2_score = Some(0.75);
        let report = validate_model(&candidate_with(metrics), &Default::default());
        assert!(report.passed());
    }

    #[test]
    fn test_unevaluated_candidate_fails() {
        let mut metrics = healthy_metrics();
        metrics.accuracy = None;
        metrics.r2_score = None;
        let report = validate_model(&candidate_with(metrics), &Default::default());
        assert!(report.failed_checks().contains(&PERFORMANCE_THRESHOLD.to_string()));
    }

    #[test]
    fn test_dominant_feature_fails_bias_check() {
        let mut metrics = healthy_metrics();
        metrics
            .feature_importance
            .insert("credit_score".to_string(), 0.8);
        let report = validate_model(&candidate_with(metrics), &Default::default());
        assert_eq!(report.failed_checks(), vec![BIAS_CHECK]);
    }

    #[test]
    fn test_oversized_artifact_fails_size_limit() {
        let mut metrics = healthy_metrics();
        metrics.model_size_bytes = Some(1024 * 1024 * 1024);
        let report = validate_model(&candidate_with(metrics), &Default::default());
        assert_eq!(report.failed_checks(), vec![SIZE_LIMIT]);
    }

    #[test]
    fn test_unstable_folds_fail_stability_check() {
        let mut metrics = healthy_metrics();
        metrics.cross_val_scores = vec![0.95, 0.70, 0.92, 0.60, 0.88];
        let report = validate_model(&candidate_with(metrics), &Default::default());
        assert_eq!(report.failed_checks(), vec![STABILITY_CHECK]);
    }

    #[test]
    fn test_missing_training_stats_fail_feature_compatibility() {
        let mut candidate = candidate_with(healthy_metrics());
        candidate.training_stats.clear();
        let report = validate_model(&candidate, &Default::default());
        assert_eq!(report.failed_checks(), vec![FEATURE_COMPATIBILITY]);
    }
}
