use crate::types::StepDefinition;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ─── Rule trait ───────────────────────────────────────────────

/// A named predicate that must hold before a step is considered satisfiable.
///
/// `check` may suspend (e.g. to consult a remote collaborator). An `Err`
/// counts as a failed rule and its description joins the step's error list.
#[async_trait]
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &str;

    /// User-facing text recorded when the predicate does not hold.
    fn message(&self) -> &str;

    async fn check(&self) -> Result<bool>;
}

/// Adapter for rules expressible as a plain closure.
pub struct PredicateRule<F> {
    name: String,
    message: String,
    predicate: F,
}

impl<F> PredicateRule<F>
where
    F: Fn() -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, message: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            predicate,
        }
    }
}

#[async_trait]
impl<F> ValidationRule for PredicateRule<F>
where
    F: Fn() -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn message(&self) -> &str {
        &self.message
    }

    async fn check(&self) -> Result<bool> {
        Ok((self.predicate)())
    }
}

// ─── Outcomes ─────────────────────────────────────────────────

/// Result of a validation pass for one step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Passed,
    Failed,
    /// The session was reset while rules were suspended; the result was
    /// discarded and no state was touched.
    Stale,
}

impl ValidationOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed)
    }
}

/// Raw result of running a step's rules, before it is applied to session
/// state (or discarded by the stale guard).
#[derive(Debug)]
pub(crate) struct RuleRun {
    pub passed: bool,
    pub errors: Vec<String>,
}

/// Run every rule of `step` in declared order, collecting all failures.
///
/// Steps with no rules trivially pass. Rule errors are caught here and
/// converted into error-list entries rather than propagating.
pub(crate) async fn run_rules(step: &StepDefinition) -> RuleRun {
    let mut errors = Vec::new();
    for rule in &step.rules {
        match rule.check().await {
            Ok(true) => {}
            Ok(false) => errors.push(rule.message().to_string()),
            Err(e) => errors.push(format!("{}: {e}", rule.name())),
        }
    }
    RuleRun {
        passed: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepDefinition;
    use anyhow::anyhow;
    use std::sync::Arc;

    struct ErroringRule;

    #[async_trait]
    impl ValidationRule for ErroringRule {
        fn name(&self) -> &str {
            "remote_check"
        }
        fn message(&self) -> &str {
            "remote check rejected the input"
        }
        async fn check(&self) -> Result<bool> {
            Err(anyhow!("connection refused"))
        }
    }

    #[tokio::test]
    async fn no_rules_trivially_passes() {
        let step = StepDefinition::new("context", "Collect context");
        let run = run_rules(&step).await;
        assert!(run.passed);
        assert!(run.errors.is_empty());
    }

    #[tokio::test]
    async fn collects_all_failures_in_declared_order() {
        let step = StepDefinition::new("context", "Collect context")
            .rule(Arc::new(PredicateRule::new(
                "has_note",
                "a note is required",
                || false,
            )))
            .rule(Arc::new(PredicateRule::new("has_os", "os is known", || {
                true
            })))
            .rule(Arc::new(PredicateRule::new(
                "has_version",
                "an app version is required",
                || false,
            )));
        let run = run_rules(&step).await;
        assert!(!run.passed);
        assert_eq!(
            run.errors,
            vec!["a note is required", "an app version is required"]
        );
    }

    #[tokio::test]
    async fn rule_error_is_caught_and_recorded() {
        let step = StepDefinition::new("analyze", "Analyze").rule(Arc::new(ErroringRule));
        let run = run_rules(&step).await;
        assert!(!run.passed);
        assert_eq!(run.errors.len(), 1);
        assert!(run.errors[0].contains("remote_check"));
        assert!(run.errors[0].contains("connection refused"));
    }
}
