//! Core state-transition logic for a troubleshooting-assistant workflow.
//!
//! A [`StepRegistry`] holds the ordered, immutable step definitions for a
//! workflow; a [`WorkflowSession`] owns all mutable per-step state for one
//! user session and enforces the step state machine (prerequisite-gated
//! advancement, optional-only skips, navigation gating, async validation
//! with a stale-result guard). [`compute_analytics`] derives progress and
//! bottleneck statistics from any session snapshot.
//!
//! The crate is a library driven by a host UI: notifications, timers, OCR,
//! and solution ranking are trait seams the host implements.

pub mod analytics;
pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod providers;
pub mod registry;
pub mod session;
pub mod types;
pub mod validation;

pub use analytics::{compute_analytics, AnalyticsConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DefinitionError, FlowError};
pub use events::{EventSink, FlowEvent, MemoryEventLog, NullEventSink};
pub use notify::{MemoryNotifier, Notice, Notifier, Severity, TracingNotifier};
pub use providers::{
    ContextEntry, ExtractedText, OcrProvider, RankedSolution, Screenshot, SolutionFeedback,
    SolutionProvider, TroubleshootContext,
};
pub use registry::StepRegistry;
pub use session::WorkflowSession;
pub use types::{
    DurationMs, StepCategory, StepDefinition, StepId, StepState, StepStatus, Timestamp,
    WorkflowAnalytics,
};
pub use validation::{PredicateRule, ValidationOutcome, ValidationRule};
