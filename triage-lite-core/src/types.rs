use crate::validation::ValidationRule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ─── Scalar aliases ───────────────────────────────────────────

/// Stable step identifier, unique within a registry.
pub type StepId = String;

/// Epoch milliseconds (UTC).
pub type Timestamp = i64;

/// Recorded per-step duration in milliseconds.
pub type DurationMs = u64;

// ─── Step status ──────────────────────────────────────────────

/// Lifecycle status of a single workflow step.
///
/// Legal transitions: `Pending → Active → Completed`,
/// `Pending → Skipped` (optional steps only), `Active → Failed`.
/// `Failed` is terminal for the attempt; re-entry requires a session reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Completed,
    Skipped,
    Failed,
}

impl StepStatus {
    /// Returns true if the step can make no further progress this attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Skipped | StepStatus::Failed
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Active => "active",
            StepStatus::Completed => "completed",
            StepStatus::Skipped => "skipped",
            StepStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ─── Step category ────────────────────────────────────────────

/// Informational classification tag. Never consulted by transition logic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCategory {
    Capture,
    Context,
    Analysis,
    Resolution,
    Review,
    Other(String),
}

// ─── Step definition ──────────────────────────────────────────

/// Immutable metadata for one workflow step.
///
/// Only status-bearing state mutates over a session's lifetime, and that
/// lives in the session, not here.
#[derive(Clone)]
pub struct StepDefinition {
    pub id: StepId,
    pub title: String,
    pub description: String,
    pub category: StepCategory,
    /// Gates whether `skip` is permitted.
    pub optional: bool,
    /// Step ids that must be `Completed` before this step may become `Active`.
    pub requirements: Vec<StepId>,
    /// Run in declared order by the validation engine.
    pub rules: Vec<Arc<dyn ValidationRule>>,
}

impl StepDefinition {
    pub fn new(id: impl Into<StepId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category: StepCategory::Other("uncategorized".to_string()),
            optional: false,
            requirements: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn category(mut self, category: StepCategory) -> Self {
        self.category = category;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn requires(mut self, id: impl Into<StepId>) -> Self {
        self.requirements.push(id.into());
        self
    }

    pub fn rule(mut self, rule: Arc<dyn ValidationRule>) -> Self {
        self.rules.push(rule);
        self
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("category", &self.category)
            .field("optional", &self.optional)
            .field("requirements", &self.requirements)
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ─── Step state ───────────────────────────────────────────────

/// Mutable per-step state owned by the session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepState {
    pub status: StepStatus,
    /// Set by `mark_failed`, surfaced to the user.
    pub failure_reason: Option<String>,
    /// Clock reading taken when the step became `Active`.
    pub started_at: Option<Timestamp>,
}

impl Default for StepState {
    fn default() -> Self {
        Self {
            status: StepStatus::Pending,
            failure_reason: None,
            started_at: None,
        }
    }
}

// ─── Derived analytics ────────────────────────────────────────

/// Snapshot statistics derived from step state and recorded durations.
/// Recomputed on demand, never stored independently.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAnalytics {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub skipped_steps: usize,
    pub failed_steps: usize,
    /// `round(100 · completed / total)`; 0 when there are no steps.
    pub progress_percent: u32,
    /// Mean of recorded durations in milliseconds; 0.0 if none recorded.
    pub average_step_ms: f64,
    /// `average_step_ms × steps still pending or active`.
    pub estimated_remaining_ms: f64,
    /// Ids whose recorded duration exceeds the mean by the configured factor.
    pub bottleneck_steps: Vec<StepId>,
}
