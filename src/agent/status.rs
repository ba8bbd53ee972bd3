//! Live status notifications for an observer (UI feed, CLI verbose mode).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Label used for events about the run as a whole.
pub const ORCHESTRATOR_LABEL: &str = "Orchestrator";
/// Label used for synthesis events.
pub const SYNTHESIZER_LABEL: &str = "Synthesizer";

/// Lifecycle state reported in a [`StatusEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLabel {
    /// Selected but not started.
    Queued,
    /// In progress.
    Running,
    /// Finished successfully.
    Complete,
    /// Finished with an error.
    Failed,
}

impl StatusLabel {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transient progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    /// Who the event is about (`"Orchestrator"`, an agent label, ...).
    pub agent_label: String,
    /// Lifecycle state.
    pub status: StatusLabel,
    /// Human-readable detail.
    pub detail: String,
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
}

impl StatusEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(agent_label: impl Into<String>, status: StatusLabel, detail: impl Into<String>) -> Self {
        Self {
            agent_label: agent_label.into(),
            status,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.agent_label,
            self.status,
            self.detail
        )
    }
}

/// Receives status events during a run.
///
/// Called from the driving task only, in stage order, never concurrently.
pub trait StatusObserver: Send + Sync {
    /// Handles one event.
    fn notify(&self, event: &StatusEvent);
}

impl<F> StatusObserver for F
where
    F: Fn(&StatusEvent) + Send + Sync,
{
    fn notify(&self, event: &StatusEvent) {
        self(event);
    }
}
