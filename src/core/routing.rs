//! Routing decisions produced by the classifier.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::AgentId;

/// The ordered, duplicate-free set of agents selected for one query.
///
/// Computed once per run and never mutated afterwards. The classifier
/// never returns an empty decision, but the workflow still handles one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoutingDecision {
    agents: BTreeSet<AgentId>,
}

/// Which workflow branch a decision selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// No agents: go straight to synthesis.
    Skip,
    /// Exactly one agent, invoked on the driving task.
    Single(AgentId),
    /// Two or more agents, invoked concurrently.
    Parallel,
}

impl RoutingDecision {
    /// Builds a decision from any set of agents (duplicates collapse).
    pub fn new(agents: impl IntoIterator<Item = AgentId>) -> Self {
        Self {
            agents: agents.into_iter().collect(),
        }
    }

    /// Routes to every defined agent.
    #[must_use]
    pub fn all() -> Self {
        Self::new(AgentId::ALL)
    }

    /// Number of selected agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns `true` if no agent was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Returns `true` if `agent` was selected.
    #[must_use]
    pub fn contains(&self, agent: AgentId) -> bool {
        self.agents.contains(&agent)
    }

    /// Iterates selected agents in routing order.
    pub fn iter(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.iter().copied()
    }

    /// Selects the workflow branch from the decision's size.
    #[must_use]
    pub fn route(&self) -> Route {
        let mut iter = self.agents.iter();
        match (iter.next(), iter.next()) {
            (None, _) => Route::Skip,
            (Some(&only), None) => Route::Single(only),
            (Some(_), Some(_)) => Route::Parallel,
        }
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.agents.iter().map(|a| a.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}
