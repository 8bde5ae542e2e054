use crate::analytics::{compute_analytics, AnalyticsConfig};
use crate::clock::{Clock, SystemClock};
use crate::error::FlowError;
use crate::events::{EventSink, FlowEvent, NullEventSink};
use crate::notify::{Notice, Notifier, Severity, TracingNotifier};
use crate::providers::SolutionFeedback;
use crate::registry::StepRegistry;
use crate::types::{DurationMs, StepId, StepState, StepStatus, WorkflowAnalytics};
use crate::validation::{run_rules, ValidationOutcome};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

// ─── Session state ────────────────────────────────────────────

#[derive(Debug)]
struct SessionState {
    steps: HashMap<StepId, StepState>,
    durations: BTreeMap<StepId, DurationMs>,
    /// Per-step validation error lists, overwritten on each run and
    /// cleared on a passing one.
    errors: BTreeMap<StepId, Vec<String>>,
    feedback: Vec<SolutionFeedback>,
    /// Bumped on reset; in-flight validations that started under an older
    /// epoch discard their results.
    epoch: u64,
}

impl SessionState {
    fn new(registry: &StepRegistry) -> Self {
        let steps = registry
            .steps()
            .iter()
            .map(|def| (def.id.clone(), StepState::default()))
            .collect();
        Self {
            steps,
            durations: BTreeMap::new(),
            errors: BTreeMap::new(),
            feedback: Vec::new(),
            epoch: 0,
        }
    }
}

// ─── Workflow session ─────────────────────────────────────────

/// The session-scoped context for one user's troubleshooting workflow.
///
/// Owns all mutable step state with exclusive-write semantics; the host
/// passes it by handle into every operation, so there are no module-level
/// singletons. All denials are recoverable: they surface a notice and leave
/// state exactly as it was. Status changes are atomic per step.
pub struct WorkflowSession {
    session_id: Uuid,
    registry: Arc<StepRegistry>,
    state: RwLock<SessionState>,
    /// One async mutex per step id, so at most one validation is in flight
    /// per step; a second request queues behind the first.
    validation_gates: Mutex<HashMap<StepId, Arc<AsyncMutex<()>>>>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    events: Arc<dyn EventSink>,
    analytics_config: AnalyticsConfig,
}

impl WorkflowSession {
    pub fn new(
        registry: StepRegistry,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let session_id = Uuid::now_v7();
        let state = SessionState::new(&registry);
        events.append(FlowEvent::SessionStarted {
            session_id,
            total_steps: registry.len(),
        });
        Self {
            session_id,
            registry: Arc::new(registry),
            state: RwLock::new(state),
            validation_gates: Mutex::new(HashMap::new()),
            clock,
            notifier,
            events,
            analytics_config: AnalyticsConfig::default(),
        }
    }

    /// Session with a wall clock, tracing-backed notices, and no event log.
    pub fn with_defaults(registry: StepRegistry) -> Self {
        Self::new(
            registry,
            Arc::new(SystemClock),
            Arc::new(TracingNotifier),
            Arc::new(NullEventSink),
        )
    }

    pub fn with_analytics_config(mut self, config: AnalyticsConfig) -> Self {
        self.analytics_config = config;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    // ── Snapshots ──

    pub fn status(&self, id: &str) -> Result<StepStatus, FlowError> {
        Ok(self.step_state(id)?.status)
    }

    pub fn step_state(&self, id: &str) -> Result<StepState, FlowError> {
        self.registry.get(id)?;
        let state = self.read();
        state
            .steps
            .get(id)
            .cloned()
            .ok_or_else(|| FlowError::StepNotFound(id.to_string()))
    }

    /// All step statuses in registry order.
    pub fn statuses(&self) -> Vec<(StepId, StepStatus)> {
        let state = self.read();
        self.registry
            .steps()
            .iter()
            .map(|def| {
                let status = state
                    .steps
                    .get(&def.id)
                    .map(|s| s.status)
                    .unwrap_or(StepStatus::Pending);
                (def.id.clone(), status)
            })
            .collect()
    }

    /// Current error list for a step; empty after a passing validation.
    pub fn validation_errors(&self, id: &str) -> Result<Vec<String>, FlowError> {
        self.registry.get(id)?;
        Ok(self.read().errors.get(id).cloned().unwrap_or_default())
    }

    pub fn durations(&self) -> BTreeMap<StepId, DurationMs> {
        self.read().durations.clone()
    }

    pub fn feedback(&self) -> Vec<SolutionFeedback> {
        self.read().feedback.clone()
    }

    pub fn analytics(&self) -> WorkflowAnalytics {
        let statuses = self.statuses();
        let durations = self.durations();
        compute_analytics(&statuses, &durations, &self.analytics_config)
    }

    // ── Transitions ──

    /// True iff every requirement of `id` is `Completed`; vacuously true
    /// with no requirements.
    pub fn can_advance(&self, id: &str) -> Result<bool, FlowError> {
        let def = self.registry.get(id)?;
        let state = self.read();
        Ok(missing_requirements(&def.requirements, &state.steps).is_empty())
    }

    /// `Pending → Active`, gated on requirements. Denial leaves state
    /// untouched.
    pub fn advance(&self, id: &str) -> Result<(), FlowError> {
        let def = Arc::clone(self.registry.get(id)?);
        let now = self.clock.now_ms();
        {
            let mut state = self.write();
            let missing = missing_requirements(&def.requirements, &state.steps);
            if !missing.is_empty() {
                drop(state);
                return Err(self.deny_transition(
                    id,
                    format!("requires completion of: {}", missing.join(", ")),
                ));
            }
            let entry = state
                .steps
                .get_mut(id)
                .ok_or_else(|| FlowError::StepNotFound(id.to_string()))?;
            if entry.status != StepStatus::Pending {
                let detail = format!("status is {}, expected pending", entry.status);
                drop(state);
                return Err(self.deny_transition(id, detail));
            }
            entry.status = StepStatus::Active;
            entry.started_at = Some(now);
        }
        tracing::debug!(step = id, "step activated");
        self.events.append(FlowEvent::StepActivated {
            step: id.to_string(),
            at: now,
        });
        Ok(())
    }

    /// `Active → Completed`. Records the step's duration from its start
    /// timestamp.
    pub fn complete(&self, id: &str) -> Result<(), FlowError> {
        self.registry.get(id)?;
        let now = self.clock.now_ms();
        let duration = {
            let mut state = self.write();
            let entry = state
                .steps
                .get_mut(id)
                .ok_or_else(|| FlowError::StepNotFound(id.to_string()))?;
            if entry.status != StepStatus::Active {
                let detail = format!("status is {}, expected active", entry.status);
                drop(state);
                return Err(self.deny_transition(id, detail));
            }
            entry.status = StepStatus::Completed;
            let duration = entry.started_at.map(|started| (now - started).max(0) as u64);
            if let Some(d) = duration {
                state.durations.insert(id.to_string(), d);
            }
            duration
        };
        tracing::debug!(step = id, duration_ms = ?duration, "step completed");
        self.events.append(FlowEvent::StepCompleted {
            step: id.to_string(),
            duration_ms: duration,
        });
        Ok(())
    }

    /// `Pending → Skipped` for optional steps. Returns false (with a
    /// user-facing notice) when the step is mandatory or already underway.
    pub fn skip(&self, id: &str) -> Result<bool, FlowError> {
        let def = Arc::clone(self.registry.get(id)?);
        if !def.optional {
            let err = FlowError::SkipDenied(id.to_string());
            tracing::warn!(step = id, "skip denied: step is mandatory");
            self.notifier.notify(
                Notice::new("Cannot skip step", err.to_string(), Severity::Warning)
                    .with_duration(4_000),
            );
            self.events.append(FlowEvent::SkipDenied {
                step: id.to_string(),
            });
            return Ok(false);
        }
        {
            let mut state = self.write();
            let entry = state
                .steps
                .get_mut(id)
                .ok_or_else(|| FlowError::StepNotFound(id.to_string()))?;
            if entry.status != StepStatus::Pending {
                let status = entry.status;
                drop(state);
                tracing::warn!(step = id, %status, "skip denied: step already underway");
                self.notifier.notify(
                    Notice::new(
                        "Cannot skip step",
                        format!("step '{id}' is already {status}"),
                        Severity::Warning,
                    )
                    .with_duration(4_000),
                );
                self.events.append(FlowEvent::SkipDenied {
                    step: id.to_string(),
                });
                return Ok(false);
            }
            entry.status = StepStatus::Skipped;
        }
        tracing::debug!(step = id, "step skipped");
        self.events.append(FlowEvent::StepSkipped {
            step: id.to_string(),
        });
        Ok(true)
    }

    /// Unconditionally marks a step `Failed`, recording the reason for
    /// display. Never blocked by requirements.
    pub fn mark_failed(&self, id: &str, reason: Option<String>) -> Result<(), FlowError> {
        let def = Arc::clone(self.registry.get(id)?);
        let now = self.clock.now_ms();
        let duration = {
            let mut state = self.write();
            let entry = state
                .steps
                .get_mut(id)
                .ok_or_else(|| FlowError::StepNotFound(id.to_string()))?;
            entry.status = StepStatus::Failed;
            entry.failure_reason = reason.clone();
            let duration = entry.started_at.map(|started| (now - started).max(0) as u64);
            if let Some(d) = duration {
                state.durations.insert(id.to_string(), d);
            }
            duration
        };
        tracing::warn!(step = id, reason = ?reason, "step failed");
        self.notifier.notify(
            Notice::new(
                format!("Step failed: {}", def.title),
                reason.clone().unwrap_or_else(|| "no reason given".to_string()),
                Severity::Error,
            )
            .with_duration(6_000),
        );
        self.events.append(FlowEvent::StepFailed {
            step: id.to_string(),
            reason,
            duration_ms: duration,
        });
        Ok(())
    }

    // ── Navigation ──

    /// Read-only gate: navigation is permitted to any step that has left
    /// `Pending`, or to a pending step whose requirements are all met.
    pub fn request_navigate(&self, id: &str) -> Result<bool, FlowError> {
        let def = self.registry.get(id)?;
        let permitted = {
            let state = self.read();
            let status = state
                .steps
                .get(id)
                .map(|s| s.status)
                .unwrap_or(StepStatus::Pending);
            status != StepStatus::Pending
                || missing_requirements(&def.requirements, &state.steps).is_empty()
        };
        if permitted {
            return Ok(true);
        }
        let err = FlowError::NavigationDenied(id.to_string());
        tracing::warn!(step = id, "navigation denied");
        self.notifier.notify(
            Notice::new("Cannot navigate", err.to_string(), Severity::Warning).with_duration(4_000),
        );
        self.events.append(FlowEvent::NavigationDenied {
            step: id.to_string(),
        });
        Ok(false)
    }

    // ── Validation ──

    /// Run the step's validation rules in declared order, recording every
    /// failure message in the step's error list (cleared on success).
    ///
    /// At most one validation per step is in flight; a concurrent request
    /// for the same step queues behind the running one. If the session is
    /// reset while rules are suspended, the outcome is discarded and
    /// reported as [`ValidationOutcome::Stale`].
    pub async fn validate(&self, id: &str) -> Result<ValidationOutcome, FlowError> {
        let def = Arc::clone(self.registry.get(id)?);
        let gate = {
            let mut gates = self.validation_gates.lock().expect("gate map poisoned");
            Arc::clone(gates.entry(id.to_string()).or_default())
        };
        let _in_flight = gate.lock().await;

        let started_epoch = self.read().epoch;
        let run = run_rules(&def).await;

        {
            let mut state = self.write();
            if state.epoch != started_epoch {
                drop(state);
                tracing::warn!(step = id, "discarding stale validation result");
                self.events.append(FlowEvent::ValidationDiscarded {
                    step: id.to_string(),
                    stale_epoch: started_epoch,
                });
                return Ok(ValidationOutcome::Stale);
            }
            if run.passed {
                state.errors.remove(id);
            } else {
                state.errors.insert(id.to_string(), run.errors.clone());
            }
        }

        if run.passed {
            tracing::debug!(step = id, "validation passed");
            self.events.append(FlowEvent::ValidationPassed {
                step: id.to_string(),
            });
            Ok(ValidationOutcome::Passed)
        } else {
            tracing::debug!(step = id, errors = run.errors.len(), "validation failed");
            self.notifier.notify(
                Notice::new(
                    format!("Check '{}' before continuing", def.title),
                    run.errors.join("; "),
                    Severity::Warning,
                )
                .with_duration(5_000),
            );
            self.events.append(FlowEvent::ValidationFailed {
                step: id.to_string(),
                errors: run.errors,
            });
            Ok(ValidationOutcome::Failed)
        }
    }

    /// Validate, then complete on a pass. A failed run surfaces the error
    /// list; a stale run counts as a denied transition.
    pub async fn validate_and_complete(&self, id: &str) -> Result<(), FlowError> {
        match self.validate(id).await? {
            ValidationOutcome::Passed => self.complete(id),
            ValidationOutcome::Failed => Err(FlowError::ValidationFailed {
                step: id.to_string(),
                errors: self.validation_errors(id)?,
            }),
            ValidationOutcome::Stale => Err(FlowError::TransitionDenied {
                step: id.to_string(),
                detail: "session was reset during validation".to_string(),
            }),
        }
    }

    // ── Lifecycle ──

    /// "Start over": every step back to `Pending`, durations, error lists,
    /// reasons, and feedback cleared. Bumps the epoch so in-flight
    /// validations discard their results.
    pub fn reset(&self) {
        let epoch = {
            let mut state = self.write();
            for entry in state.steps.values_mut() {
                *entry = StepState::default();
            }
            state.durations.clear();
            state.errors.clear();
            state.feedback.clear();
            state.epoch += 1;
            state.epoch
        };
        tracing::info!(epoch, "session reset");
        self.events.append(FlowEvent::SessionReset { epoch });
    }

    /// Record the user's verdict on a presented solution.
    pub fn record_feedback(&self, solution_id: &str, helpful: bool, comment: Option<String>) {
        let feedback = SolutionFeedback {
            solution_id: solution_id.to_string(),
            helpful,
            comment,
            at: self.clock.now_ms(),
        };
        self.write().feedback.push(feedback);
        self.events.append(FlowEvent::FeedbackRecorded {
            solution_id: solution_id.to_string(),
            helpful,
        });
    }

    // ── Internals ──

    fn deny_transition(&self, id: &str, detail: String) -> FlowError {
        tracing::warn!(step = id, detail = %detail, "transition denied");
        self.notifier.notify(
            Notice::new(
                "Cannot start step",
                format!("step '{id}': {detail}"),
                Severity::Warning,
            )
            .with_duration(4_000),
        );
        self.events.append(FlowEvent::TransitionDenied {
            step: id.to_string(),
            detail: detail.clone(),
        });
        FlowError::TransitionDenied {
            step: id.to_string(),
            detail,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionState> {
        self.state.read().expect("session lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SessionState> {
        self.state.write().expect("session lock poisoned")
    }
}

/// Requirements of a step that are not yet `Completed`, in declared order.
fn missing_requirements(
    requirements: &[StepId],
    steps: &HashMap<StepId, StepState>,
) -> Vec<StepId> {
    requirements
        .iter()
        .filter(|req| {
            steps
                .get(req.as_str())
                .map(|s| s.status != StepStatus::Completed)
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::MemoryEventLog;
    use crate::notify::MemoryNotifier;
    use crate::types::StepDefinition;
    use crate::validation::PredicateRule;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Harness {
        session: WorkflowSession,
        clock: Arc<ManualClock>,
        notifier: Arc<MemoryNotifier>,
        events: Arc<MemoryEventLog>,
    }

    fn harness(defs: Vec<StepDefinition>) -> Harness {
        let clock = Arc::new(ManualClock::new(0));
        let notifier = Arc::new(MemoryNotifier::new());
        let events = Arc::new(MemoryEventLog::new());
        let session = WorkflowSession::new(
            StepRegistry::new(defs).unwrap(),
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            Arc::clone(&events) as Arc<dyn EventSink>,
        );
        Harness {
            session,
            clock,
            notifier,
            events,
        }
    }

    fn two_step_chain() -> Vec<StepDefinition> {
        vec![
            StepDefinition::new("a", "Step A"),
            StepDefinition::new("b", "Step B").requires("a"),
        ]
    }

    #[test]
    fn can_advance_is_vacuously_true_without_requirements() {
        let h = harness(two_step_chain());
        assert!(h.session.can_advance("a").unwrap());
    }

    #[test]
    fn advance_is_gated_by_requirements() {
        let h = harness(two_step_chain());
        assert!(!h.session.can_advance("b").unwrap());
        let err = h.session.advance("b").unwrap_err();
        assert!(matches!(err, FlowError::TransitionDenied { .. }));
        assert_eq!(h.session.status("b").unwrap(), StepStatus::Pending);

        h.session.advance("a").unwrap();
        h.session.complete("a").unwrap();
        assert!(h.session.can_advance("b").unwrap());
        h.session.advance("b").unwrap();
        assert_eq!(h.session.status("b").unwrap(), StepStatus::Active);
    }

    #[test]
    fn advance_rejects_non_pending_step() {
        let h = harness(two_step_chain());
        h.session.advance("a").unwrap();
        let err = h.session.advance("a").unwrap_err();
        assert!(matches!(err, FlowError::TransitionDenied { .. }));
        assert_eq!(h.session.status("a").unwrap(), StepStatus::Active);
    }

    #[test]
    fn complete_records_duration_from_clock() {
        let h = harness(two_step_chain());
        h.session.advance("a").unwrap();
        h.clock.advance(1_500);
        h.session.complete("a").unwrap();
        assert_eq!(h.session.durations().get("a"), Some(&1_500));
    }

    #[test]
    fn skip_denied_for_mandatory_step() {
        let h = harness(vec![StepDefinition::new("c", "Mandatory")]);
        assert!(!h.session.skip("c").unwrap());
        assert_eq!(h.session.status("c").unwrap(), StepStatus::Pending);
        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, Severity::Warning);
    }

    #[test]
    fn skip_succeeds_for_optional_pending_step() {
        let h = harness(vec![StepDefinition::new("c", "Optional").optional()]);
        assert!(h.session.skip("c").unwrap());
        assert_eq!(h.session.status("c").unwrap(), StepStatus::Skipped);
    }

    #[test]
    fn skip_denied_once_step_is_underway() {
        let h = harness(vec![StepDefinition::new("c", "Optional").optional()]);
        h.session.advance("c").unwrap();
        assert!(!h.session.skip("c").unwrap());
        assert_eq!(h.session.status("c").unwrap(), StepStatus::Active);
    }

    #[test]
    fn mark_failed_is_never_blocked() {
        let h = harness(two_step_chain());
        // b's requirements are unmet, failure still lands
        h.session
            .mark_failed("b", Some("analysis crashed".to_string()))
            .unwrap();
        let state = h.session.step_state("b").unwrap();
        assert_eq!(state.status, StepStatus::Failed);
        assert_eq!(state.failure_reason.as_deref(), Some("analysis crashed"));
    }

    #[test]
    fn navigation_gate() {
        let h = harness(two_step_chain());
        // pending with unmet requirements: denied
        assert!(!h.session.request_navigate("b").unwrap());
        // pending with met requirements: permitted
        h.session.advance("a").unwrap();
        h.session.complete("a").unwrap();
        assert!(h.session.request_navigate("b").unwrap());
        // non-pending is always reachable
        assert!(h.session.request_navigate("a").unwrap());
        // the denial produced exactly one notice, nothing mutated
        assert_eq!(h.notifier.notices().len(), 1);
        assert_eq!(h.session.status("b").unwrap(), StepStatus::Pending);
    }

    #[test]
    fn unknown_step_id_is_an_error_everywhere() {
        let h = harness(two_step_chain());
        assert!(matches!(
            h.session.status("zz").unwrap_err(),
            FlowError::StepNotFound(_)
        ));
        assert!(matches!(
            h.session.advance("zz").unwrap_err(),
            FlowError::StepNotFound(_)
        ));
        assert!(matches!(
            h.session.skip("zz").unwrap_err(),
            FlowError::StepNotFound(_)
        ));
        assert!(matches!(
            h.session.request_navigate("zz").unwrap_err(),
            FlowError::StepNotFound(_)
        ));
    }

    #[tokio::test]
    async fn validation_overwrites_and_clears_error_list() {
        let flag = Arc::new(AtomicBool::new(false));
        let read = Arc::clone(&flag);
        let defs = vec![StepDefinition::new("ctx", "Context").rule(Arc::new(
            PredicateRule::new("has_note", "a note is required", move || {
                read.load(Ordering::SeqCst)
            }),
        ))];
        let h = harness(defs);

        assert_eq!(
            h.session.validate("ctx").await.unwrap(),
            ValidationOutcome::Failed
        );
        assert_eq!(
            h.session.validation_errors("ctx").unwrap(),
            vec!["a note is required"]
        );

        // fix the underlying data, re-run, list must clear
        flag.store(true, Ordering::SeqCst);
        assert_eq!(
            h.session.validate("ctx").await.unwrap(),
            ValidationOutcome::Passed
        );
        assert!(h.session.validation_errors("ctx").unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_validation_is_discarded_after_reset() {
        struct GatedRule {
            started: tokio::sync::mpsc::UnboundedSender<()>,
            release: Arc<tokio::sync::Notify>,
        }

        #[async_trait::async_trait]
        impl crate::validation::ValidationRule for GatedRule {
            fn name(&self) -> &str {
                "gated"
            }
            fn message(&self) -> &str {
                "gated check failed"
            }
            async fn check(&self) -> anyhow::Result<bool> {
                let _ = self.started.send(());
                self.release.notified().await;
                Ok(false)
            }
        }

        let (started_tx, mut started_rx) = tokio::sync::mpsc::unbounded_channel();
        let release = Arc::new(tokio::sync::Notify::new());
        let defs = vec![StepDefinition::new("ctx", "Context").rule(Arc::new(GatedRule {
            started: started_tx,
            release: Arc::clone(&release),
        }))];
        let notifier = Arc::new(MemoryNotifier::new());
        let events = Arc::new(MemoryEventLog::new());
        let session = Arc::new(WorkflowSession::new(
            StepRegistry::new(defs).unwrap(),
            Arc::new(ManualClock::new(0)) as Arc<dyn Clock>,
            notifier as Arc<dyn Notifier>,
            Arc::clone(&events) as Arc<dyn EventSink>,
        ));

        let s2 = Arc::clone(&session);
        let handle = tokio::spawn(async move { s2.validate("ctx").await });

        // the rule is suspended mid-validation when the reset lands
        started_rx.recv().await.unwrap();
        session.reset();
        release.notify_one();

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, ValidationOutcome::Stale);
        assert!(session.validation_errors("ctx").unwrap().is_empty());
        assert!(events
            .snapshot()
            .iter()
            .any(|e| matches!(e, FlowEvent::ValidationDiscarded { .. })));
    }

    #[tokio::test]
    async fn queued_validations_never_interleave() {
        struct NonReentrantRule {
            busy: Arc<AtomicBool>,
        }

        #[async_trait::async_trait]
        impl crate::validation::ValidationRule for NonReentrantRule {
            fn name(&self) -> &str {
                "non_reentrant"
            }
            fn message(&self) -> &str {
                "never fails"
            }
            async fn check(&self) -> anyhow::Result<bool> {
                assert!(
                    !self.busy.swap(true, Ordering::SeqCst),
                    "validation rule entered concurrently"
                );
                tokio::task::yield_now().await;
                self.busy.store(false, Ordering::SeqCst);
                Ok(true)
            }
        }

        let busy = Arc::new(AtomicBool::new(false));
        let defs = vec![
            StepDefinition::new("ctx", "Context").rule(Arc::new(NonReentrantRule {
                busy: Arc::clone(&busy),
            })),
        ];
        let h = harness(defs);
        let session = Arc::new(h.session);

        let a = {
            let s = Arc::clone(&session);
            tokio::spawn(async move { s.validate("ctx").await })
        };
        let b = {
            let s = Arc::clone(&session);
            tokio::spawn(async move { s.validate("ctx").await })
        };
        assert!(a.await.unwrap().unwrap().passed());
        assert!(b.await.unwrap().unwrap().passed());
    }

    #[tokio::test]
    async fn validate_and_complete_surfaces_error_list() {
        let defs = vec![
            StepDefinition::new("ctx", "Context").rule(Arc::new(PredicateRule::new(
                "has_note",
                "a note is required",
                || false,
            ))),
        ];
        let h = harness(defs);
        h.session.advance("ctx").unwrap();
        let err = h.session.validate_and_complete("ctx").await.unwrap_err();
        match err {
            FlowError::ValidationFailed { step, errors } => {
                assert_eq!(step, "ctx");
                assert_eq!(errors, vec!["a note is required"]);
            }
            other => panic!("expected ValidationFailed, got {other}"),
        }
        assert_eq!(h.session.status("ctx").unwrap(), StepStatus::Active);
    }

    #[test]
    fn reset_returns_everything_to_pending() {
        let h = harness(two_step_chain());
        h.session.advance("a").unwrap();
        h.clock.advance(800);
        h.session.complete("a").unwrap();
        h.session.record_feedback("sol-1", true, None);

        h.session.reset();
        assert_eq!(h.session.status("a").unwrap(), StepStatus::Pending);
        assert!(h.session.durations().is_empty());
        assert!(h.session.feedback().is_empty());
        let events = h.events.snapshot();
        assert!(matches!(
            events.last(),
            Some(FlowEvent::SessionReset { epoch: 1 })
        ));
    }

    #[test]
    fn analytics_reflects_session_snapshot() {
        let h = harness(vec![
            StepDefinition::new("a", "A"),
            StepDefinition::new("b", "B"),
            StepDefinition::new("c", "C").optional(),
        ]);
        h.session.advance("a").unwrap();
        h.clock.advance(1_000);
        h.session.complete("a").unwrap();
        h.session.skip("c").unwrap();

        let analytics = h.session.analytics();
        assert_eq!(analytics.total_steps, 3);
        assert_eq!(analytics.completed_steps, 1);
        assert_eq!(analytics.skipped_steps, 1);
        assert_eq!(analytics.progress_percent, 33);
        assert_eq!(analytics.average_step_ms, 1_000.0);
    }
}
