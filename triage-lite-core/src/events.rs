use crate::types::{DurationMs, StepId, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use uuid::Uuid;

/// Audit trail for a workflow session — one event per state change or
/// denied request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FlowEvent {
    SessionStarted {
        session_id: Uuid,
        total_steps: usize,
    },
    StepActivated {
        step: StepId,
        at: Timestamp,
    },
    StepCompleted {
        step: StepId,
        duration_ms: Option<DurationMs>,
    },
    StepSkipped {
        step: StepId,
    },
    StepFailed {
        step: StepId,
        reason: Option<String>,
        duration_ms: Option<DurationMs>,
    },
    ValidationPassed {
        step: StepId,
    },
    ValidationFailed {
        step: StepId,
        errors: Vec<String>,
    },
    /// An in-flight validation finished after the session moved on; its
    /// result was thrown away.
    ValidationDiscarded {
        step: StepId,
        stale_epoch: u64,
    },
    TransitionDenied {
        step: StepId,
        detail: String,
    },
    SkipDenied {
        step: StepId,
    },
    NavigationDenied {
        step: StepId,
    },
    SessionReset {
        epoch: u64,
    },
    FeedbackRecorded {
        solution_id: String,
        helpful: bool,
    },
}

/// Append-only sink for session events.
pub trait EventSink: Send + Sync {
    /// Append an event and return its sequence number (0-based).
    fn append(&self, event: FlowEvent) -> u64;
}

/// In-memory event log for tests and single-session hosts.
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    inner: RwLock<Vec<FlowEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("event log poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<FlowEvent> {
        self.inner.read().expect("event log poisoned").clone()
    }
}

impl EventSink for MemoryEventLog {
    fn append(&self, event: FlowEvent) -> u64 {
        let mut log = self.inner.write().expect("event log poisoned");
        log.push(event);
        (log.len() - 1) as u64
    }
}

/// Sink that drops everything. For hosts that keep their own audit trail.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn append(&self, _event: FlowEvent) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_sequence_numbers() {
        let log = MemoryEventLog::new();
        let a = log.append(FlowEvent::StepActivated {
            step: "capture".to_string(),
            at: 1_000,
        });
        let b = log.append(FlowEvent::StepCompleted {
            step: "capture".to_string(),
            duration_ms: Some(500),
        });
        assert_eq!((a, b), (0, 1));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn events_serialize() {
        let event = FlowEvent::ValidationFailed {
            step: "context".to_string(),
            errors: vec!["a note is required".to_string()],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("ValidationFailed"));
    }
}
