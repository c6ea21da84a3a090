//! Feature drift scoring.
//!
//! Drift is the normalized distance of a live feature value from its
//! training-time distribution: `|value - mean| / (std + ε)` per feature,
//! averaged over every numeric feature present in both the live request and
//! the stored training statistics. Zero-variance features stay finite
//! through the ε term.

use std::collections::HashMap;

use modelgate_state::FeatureStats;

/// Guards against division by zero for zero-variance features.
pub const DRIFT_EPSILON: f64 = 1e-6;

/// Mean per-feature drift score for a live request.
///
/// Returns 0.0 when no comparable statistics exist (unknown features,
/// non-numeric values, or an empty stats map).
pub fn drift_score(
    features: &serde_json::Value,
    training_stats: &HashMap<String, FeatureStats>,
) -> f64 {
    let Some(map) = features.as_object() else {
        return 0.0;
    };

    let mut scores = Vec::new();
    for (name, value) in map {
        let Some(value) = value.as_f64() else {
            continue;
        };
        if let Some(stats) = training_stats.get(name) {
            scores.push((value - stats.mean).abs() / (stats.std + DRIFT_EPSILON));
        }
    }

    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats(mean: f64, std: f64) -> FeatureStats {
        FeatureStats { mean, std }
    }

    #[test]
    fn test_value_at_training_mean_scores_zero() {
        let mut training = HashMap::new();
        training.insert("income".to_string(), stats(50_000.0, 10_000.0));

        let score = drift_score(&json!({"income": 50_000.0}), &training);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_zero_variance_feature_stays_finite() {
        let mut training = HashMap::new();
        training.insert("term_months".to_string(), stats(360.0, 0.0));

        let score = drift_score(&json!({"term_months": 420.0}), &training);
        assert!(score.is_finite());
        assert!(score > 0.0);
    }

    #[test]
    fn test_no_comparable_stats_scores_zero() {
        let training = HashMap::new();
        assert_eq!(drift_score(&json!({"income": 50_000.0}), &training), 0.0);

        let mut training = HashMap::new();
        training.insert("income".to_string(), stats(50_000.0, 10_000.0));
        // Live request has no overlap with the stats.
        assert_eq!(drift_score(&json!({"age": 41}), &training), 0.0);
    }

    #[test]
    fn test_non_numeric_features_ignored() {
        let mut training = HashMap::new();
        training.insert("income".to_string(), stats(50_000.0, 10_000.0));
        training.insert("state".to_string(), stats(0.0, 1.0));

        let score = drift_score(&json!({"income": 60_000.0, "state": "CA"}), &training);
        // Only income contributes: |60000 - 50000| / (10000 + eps) ≈ 1.0
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_over_multiple_features() {
        let mut training = HashMap::new();
        training.insert("a".to_string(), stats(0.0, 1.0));
        training.insert("b".to_string(), stats(0.0, 1.0));

        let score = drift_score(&json!({"a": 1.0, "b": 3.0}), &training);
        assert!((score - 2.0).abs() < 1e-5);
    }
}
