//! Result of one orchestrated query.

use serde::Serialize;
use uuid::Uuid;

use super::timing::TimingReport;
use crate::core::{AgentId, RoutingDecision};

/// Final result returned by [`Orchestrator::query`](super::Orchestrator::query).
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Synthesized markdown response.
    pub response: String,
    /// Per-stage timings.
    pub timing: TimingReport,
    /// Agents the query was routed to.
    pub decision: RoutingDecision,
    /// Routed agents whose backend failed; the response was degraded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_agents: Vec<AgentId>,
    /// Trace identifier of the run.
    pub trace_id: Uuid,
}

impl QueryResult {
    /// Returns `true` if any routed backend failed.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.failed_agents.is_empty()
    }
}
