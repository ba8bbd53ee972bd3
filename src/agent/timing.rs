//! Per-stage wall-clock timing.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::core::AgentId;

/// Key for the classification stage.
pub const KEY_ANALYZE: &str = "analyze";
/// Key for the synthesis stage.
pub const KEY_COMBINE: &str = "combine";
/// Key for the whole run.
pub const KEY_TOTAL: &str = "total";

/// Accumulates stage durations while a run is in progress.
#[derive(Debug, Clone, Default)]
pub struct TimingRecorder {
    analyze: Duration,
    agents: BTreeMap<AgentId, Duration>,
    combine: Duration,
}

impl TimingRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the classification stage.
    pub fn analyze(&mut self, elapsed: Duration) {
        self.analyze += elapsed;
    }

    /// Records one agent's own duration.
    pub fn agent(&mut self, agent: AgentId, elapsed: Duration) {
        *self.agents.entry(agent).or_default() += elapsed;
    }

    /// Attributes one fan-out duration evenly to every agent in it.
    ///
    /// The invocations overlap, so this is an approximation: each agent
    /// is charged `elapsed / n`.
    pub fn fan_out(&mut self, agents: impl IntoIterator<Item = AgentId>, elapsed: Duration) {
        let agents: Vec<AgentId> = agents.into_iter().collect();
        let Ok(n) = u32::try_from(agents.len()) else {
            return;
        };
        if n == 0 {
            return;
        }
        let share = elapsed / n;
        for agent in agents {
            self.agent(agent, share);
        }
    }

    /// Records the synthesis stage.
    pub fn combine(&mut self, elapsed: Duration) {
        self.combine += elapsed;
    }

    /// Freezes the recorder with the run's total duration.
    #[must_use]
    pub fn finish(self, total: Duration) -> TimingReport {
        TimingReport {
            analyze: self.analyze,
            agents: self.agents,
            combine: self.combine,
            total,
        }
    }
}

/// Immutable stage timings for a finished run.
///
/// Serializes as a flat object of float seconds with every key present:
/// `analyze`, one key per agent, `combine`, `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingReport {
    analyze: Duration,
    agents: BTreeMap<AgentId, Duration>,
    combine: Duration,
    total: Duration,
}

impl TimingReport {
    /// Classification time.
    #[must_use]
    pub const fn analyze(&self) -> Duration {
        self.analyze
    }

    /// Time charged to `agent`; zero when it did not run.
    #[must_use]
    pub fn agent(&self, agent: AgentId) -> Duration {
        self.agents.get(&agent).copied().unwrap_or_default()
    }

    /// Synthesis time.
    #[must_use]
    pub const fn combine(&self) -> Duration {
        self.combine
    }

    /// Whole-run time.
    #[must_use]
    pub const fn total(&self) -> Duration {
        self.total
    }

    /// `(key, duration)` pairs in report order.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, Duration)> {
        let mut entries = vec![(KEY_ANALYZE, self.analyze)];
        entries.extend(AgentId::ALL.iter().map(|&a| (a.as_str(), self.agent(a))));
        entries.push((KEY_COMBINE, self.combine));
        entries.push((KEY_TOTAL, self.total));
        entries
    }
}

impl Serialize for TimingReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, duration) in entries {
            map.serialize_entry(key, &duration.as_secs_f64())?;
        }
        map.end()
    }
}
