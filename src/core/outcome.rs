//! Per-agent results of the execution stage.

use std::collections::BTreeMap;

use super::AgentId;
use crate::error::BackendError;

/// Result of invoking one backend agent: text or a recorded failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The agent returned text.
    Success(String),
    /// The agent failed; the error is kept for telemetry only.
    Failure(BackendError),
}

impl AgentOutcome {
    /// Returns the successful text, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success(text) => Some(text),
            Self::Failure(_) => None,
        }
    }

    /// Returns `true` for a failure outcome.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Length in bytes of the output (zero for failures).
    #[must_use]
    pub fn output_len(&self) -> usize {
        self.text().map_or(0, str::len)
    }
}

impl From<Result<String, BackendError>> for AgentOutcome {
    fn from(result: Result<String, BackendError>) -> Self {
        match result {
            Ok(text) => Self::Success(text),
            Err(err) => Self::Failure(err),
        }
    }
}

/// Outcomes keyed by agent, independent of completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcomes {
    by_agent: BTreeMap<AgentId, AgentOutcome>,
}

impl Outcomes {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome for `agent`, replacing any earlier entry.
    pub fn insert(&mut self, agent: AgentId, outcome: AgentOutcome) {
        self.by_agent.insert(agent, outcome);
    }

    /// Outcome recorded for `agent`.
    #[must_use]
    pub fn get(&self, agent: AgentId) -> Option<&AgentOutcome> {
        self.by_agent.get(&agent)
    }

    /// Successful text for `agent`, if it succeeded with non-empty output.
    #[must_use]
    pub fn success_text(&self, agent: AgentId) -> Option<&str> {
        self.get(agent)
            .and_then(AgentOutcome::text)
            .filter(|t| !t.trim().is_empty())
    }

    /// Iterates outcomes in agent order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &AgentOutcome)> + '_ {
        self.by_agent.iter().map(|(id, o)| (*id, o))
    }

    /// Number of recorded outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_agent.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_agent.is_empty()
    }

    /// Number of failure outcomes.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.by_agent.values().filter(|o| o.is_failure()).count()
    }
}

impl FromIterator<(AgentId, AgentOutcome)> for Outcomes {
    fn from_iter<I: IntoIterator<Item = (AgentId, AgentOutcome)>>(iter: I) -> Self {
        Self {
            by_agent: iter.into_iter().collect(),
        }
    }
}
