use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Severity of a user-facing notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// One toast-style notice handed to the host UI. Fire-and-forget; the core
/// never consumes a return value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    /// Suggested display time; `None` leaves the policy to the host.
    pub duration_ms: Option<u64>,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}

/// Notification surface implemented by the host.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Logs notices through `tracing` instead of a UI. The default surface when
/// a host has not wired its own.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Severity::Info | Severity::Success => {
                tracing::info!(title = %notice.title, "{}", notice.message);
            }
            Severity::Warning => {
                tracing::warn!(title = %notice.title, "{}", notice.message);
            }
            Severity::Error => {
                tracing::error!(title = %notice.title, "{}", notice.message);
            }
        }
    }
}

/// Collects notices for assertions in tests.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    inner: RwLock<Vec<Notice>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.inner.read().expect("notifier lock poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notice: Notice) {
        self.inner
            .write()
            .expect("notifier lock poisoned")
            .push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_notifier_collects_in_order() {
        let notifier = MemoryNotifier::new();
        notifier.notify(Notice::new("First", "one", Severity::Info));
        notifier.notify(Notice::new("Second", "two", Severity::Error).with_duration(4_000));
        let notices = notifier.notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].title, "First");
        assert_eq!(notices[1].duration_ms, Some(4_000));
    }
}
