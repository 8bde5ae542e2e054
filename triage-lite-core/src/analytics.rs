use crate::types::{DurationMs, StepId, StepStatus, WorkflowAnalytics};
use std::collections::BTreeMap;

/// Tuning for derived statistics.
#[derive(Clone, Debug)]
pub struct AnalyticsConfig {
    /// A step is a bottleneck when its duration exceeds `mean × factor`.
    pub bottleneck_factor: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            bottleneck_factor: 2.0,
        }
    }
}

/// Derive analytics from a snapshot of step statuses and recorded durations.
///
/// Pure: no side effects, no hidden staleness; the result reflects exactly
/// the snapshot passed in.
pub fn compute_analytics(
    steps: &[(StepId, StepStatus)],
    durations: &BTreeMap<StepId, DurationMs>,
    config: &AnalyticsConfig,
) -> WorkflowAnalytics {
    let total_steps = steps.len();
    let count = |wanted: StepStatus| steps.iter().filter(|(_, s)| *s == wanted).count();
    let completed_steps = count(StepStatus::Completed);
    let skipped_steps = count(StepStatus::Skipped);
    let failed_steps = count(StepStatus::Failed);
    let remaining = count(StepStatus::Pending) + count(StepStatus::Active);

    let progress_percent = if total_steps == 0 {
        0
    } else {
        (100.0 * completed_steps as f64 / total_steps as f64).round() as u32
    };

    let average_step_ms = if durations.is_empty() {
        0.0
    } else {
        durations.values().map(|&d| d as f64).sum::<f64>() / durations.len() as f64
    };

    let threshold = average_step_ms * config.bottleneck_factor;
    let bottleneck_steps = durations
        .iter()
        .filter(|(_, &d)| average_step_ms > 0.0 && (d as f64) > threshold)
        .map(|(id, _)| id.clone())
        .collect();

    WorkflowAnalytics {
        total_steps,
        completed_steps,
        skipped_steps,
        failed_steps,
        progress_percent,
        average_step_ms,
        estimated_remaining_ms: average_step_ms * remaining as f64,
        bottleneck_steps,
    }
}
