//! A-B experiment analysis and promotion recommendation.
//!
//! Aggregates the performance ledger per variant, computes improvement and
//! statistical significance, and recommends promotion only when all three
//! criteria hold: p-value below the significance level, improvement above
//! the minimum margin, and the experiment old enough. There is no automatic
//! rejection path; an underperforming candidate keeps monitoring until an
//! operator closes the experiment.

use std::sync::Arc;

use chrono::{Duration, Utc};
use modelgate_state::{
    Experiment, ExperimentId, ExperimentStore, PerformanceLedger, PerformanceSample,
    SampleOutcome,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::stats::{two_proportion_p_value, welch_p_value};

/// Analysis thresholds and windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Maximum p-value considered significant
    pub significance_level: f64,
    /// Minimum improvement (candidate − baseline) required for promotion
    pub min_improvement: f64,
    /// Minimum whole days an experiment must run before promotion
    pub min_duration_days: i64,
    /// Recent-window size for the headline per-variant aggregates
    pub recent_window: usize,
    /// How far back to read ledger samples
    pub lookback_days: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            min_improvement: 0.02,
            min_duration_days: 7,
            recent_window: 10,
            lookback_days: 30,
        }
    }
}

/// Promotion verdict for one analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Promote,
    ContinueMonitoring,
}

/// Aggregates for one experiment arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPerformance {
    /// `None` for a cold-start experiment with no baseline
    pub model_version: Option<String>,
    pub sample_count: usize,
    /// Mean correctness over the recent window (classification)
    pub recent_accuracy: Option<f64>,
    /// Mean absolute error over the recent window (regression)
    pub recent_error: Option<f64>,
    /// Mean drift score over the recent window
    pub recent_drift: f64,
    /// Full-experiment correctness counts, feeding the significance test
    pub correct: u64,
    pub total: u64,
}

/// Complete analysis of one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub experiment_id: ExperimentId,
    pub model_type: String,
    /// Whole days since the experiment started
    pub duration_days: i64,
    pub baseline: VariantPerformance,
    pub candidate: VariantPerformance,
    /// Candidate metric minus baseline metric; positive = candidate better
    pub improvement: f64,
    pub p_value: f64,
    pub recommendation: Recommendation,
}

/// Reads the performance ledger and scores experiments.
pub struct ExperimentAnalyzer {
    experiments: Arc<dyn ExperimentStore>,
    ledger: Arc<dyn PerformanceLedger>,
    config: AnalysisConfig,
}

impl ExperimentAnalyzer {
    pub fn new(
        experiments: Arc<dyn ExperimentStore>,
        ledger: Arc<dyn PerformanceLedger>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            experiments,
            ledger,
            config,
        }
    }

    /// Aggregate both arms of an experiment and recommend an action.
    pub async fn analyze(&self, experiment_id: &ExperimentId) -> Result<AnalysisReport> {
        let experiment = self.experiments.get(experiment_id).await?;
        let since = Utc::now() - Duration::days(self.config.lookback_days);

        let candidate_samples = self
            .ledger
            .query(&experiment.candidate_version, since)
            .await?;
        let baseline_samples = match &experiment.baseline_version {
            Some(baseline) => self.ledger.query(baseline, since).await?,
            None => Vec::new(),
        };

        let candidate = aggregate_variant(
            Some(experiment.candidate_version.clone()),
            &candidate_samples,
            self.config.recent_window,
        );
        let baseline = aggregate_variant(
            experiment.baseline_version.clone(),
            &baseline_samples,
            self.config.recent_window,
        );

        let duration_days = duration_days(&experiment);
        let improvement = improvement(&baseline, &candidate);
        let p_value = significance(&baseline_samples, &candidate_samples, &baseline, &candidate);

        let recommendation = if p_value < self.config.significance_level
            && improvement > self.config.min_improvement
            && duration_days >= self.config.min_duration_days
        {
            Recommendation::Promote
        } else {
            Recommendation::ContinueMonitoring
        };

        Ok(AnalysisReport {
            experiment_id: experiment.experiment_id.clone(),
            model_type: experiment.model_type.clone(),
            duration_days,
            baseline,
            candidate,
            improvement,
            p_value,
            recommendation,
        })
    }
}

fn duration_days(experiment: &Experiment) -> i64 {
    (Utc::now() - experiment.start_time).num_days()
}

fn aggregate_variant(
    model_version: Option<String>,
    samples: &[PerformanceSample],
    recent_window: usize,
) -> VariantPerformance {
    let window: Vec<&PerformanceSample> = samples.iter().rev().take(recent_window).collect();

    let correctness: Vec<bool> = window
        .iter()
        .filter_map(|s| match s.outcome {
            SampleOutcome::Correctness(c) => Some(c),
            SampleOutcome::Error(_) => None,
        })
        .collect();
    let errors: Vec<f64> = window
        .iter()
        .filter_map(|s| match s.outcome {
            SampleOutcome::Error(e) => Some(e),
            SampleOutcome::Correctness(_) => None,
        })
        .collect();

    let recent_accuracy = if correctness.is_empty() {
        None
    } else {
        Some(correctness.iter().filter(|c| **c).count() as f64 / correctness.len() as f64)
    };
    let recent_error = if errors.is_empty() {
        None
    } else {
        Some(errors.iter().sum::<f64>() / errors.len() as f64)
    };
    let recent_drift = if window.is_empty() {
        0.0
    } else {
        window.iter().map(|s| s.drift_score).sum::<f64>() / window.len() as f64
    };

    let (correct, total) = samples.iter().fold((0u64, 0u64), |(c, t), s| match s.outcome {
        SampleOutcome::Correctness(true) => (c + 1, t + 1),
        SampleOutcome::Correctness(false) => (c, t + 1),
        SampleOutcome::Error(_) => (c, t),
    });

    VariantPerformance {
        model_version,
        sample_count: samples.len(),
        recent_accuracy,
        recent_error,
        recent_drift,
        correct,
        total,
    }
}

/// Sign convention: positive means the candidate is better. For
/// classification that is higher accuracy; for regression, lower error.
fn improvement(baseline: &VariantPerformance, candidate: &VariantPerformance) -> f64 {
    match (
        baseline.recent_accuracy,
        candidate.recent_accuracy,
        baseline.recent_error,
        candidate.recent_error,
    ) {
        (Some(b), Some(c), _, _) => c - b,
        (_, _, Some(b), Some(c)) => b - c,
        _ => 0.0,
    }
}

fn significance(
    baseline_samples: &[PerformanceSample],
    candidate_samples: &[PerformanceSample],
    baseline: &VariantPerformance,
    candidate: &VariantPerformance,
) -> f64 {
    if baseline.total > 0 && candidate.total > 0 {
        return two_proportion_p_value(
            baseline.correct,
            baseline.total,
            candidate.correct,
            candidate.total,
        );
    }
    let errors = |samples: &[PerformanceSample]| -> Vec<f64> {
        samples
            .iter()
            .filter_map(|s| match s.outcome {
                SampleOutcome::Error(e) => Some(e),
                SampleOutcome::Correctness(_) => None,
            })
            .collect()
    };
    let b = errors(baseline_samples);
    let c = errors(candidate_samples);
    if b.is_empty() || c.is_empty() {
        // One arm has no data at all (cold start): never significant.
        1.0
    } else {
        welch_p_value(&b, &c)
    }
}
