//! Identifiers for the backend agents a query can be routed to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A backend agent the orchestrator can invoke.
///
/// The derived [`Ord`] fixes the order in which agents appear in routing
/// decisions, outcome maps, status events, and the synthesis prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    /// Web documentation search (explanations, concepts, guides).
    DocSearch,
    /// Code-snippet database query (examples, implementations).
    CodeQuery,
}

impl AgentId {
    /// Every defined agent, in routing order.
    pub const ALL: [Self; 2] = [Self::DocSearch, Self::CodeQuery];

    /// Stable machine name used in spans, timing keys, and JSON output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DocSearch => "doc_search",
            Self::CodeQuery => "code_query",
        }
    }

    /// Human-readable label used in status events.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DocSearch => "Doc Search Agent",
            Self::CodeQuery => "Code Query Agent",
        }
    }

    /// Status detail shown while the agent runs.
    #[must_use]
    pub const fn running_detail(self) -> &'static str {
        match self {
            Self::DocSearch => "Searching documentation...",
            Self::CodeQuery => "Querying code snippets...",
        }
    }

    /// Status detail shown when the agent succeeded.
    #[must_use]
    pub const fn complete_detail(self) -> &'static str {
        match self {
            Self::DocSearch => "Documentation retrieved",
            Self::CodeQuery => "Code snippets retrieved",
        }
    }

    /// Section heading for this agent's output in the synthesis prompt.
    #[must_use]
    pub const fn section_heading(self) -> &'static str {
        match self {
            Self::DocSearch => "Documentation/Explanation",
            Self::CodeQuery => "Code Examples",
        }
    }

    /// Placeholder rendered when the agent produced nothing usable.
    #[must_use]
    pub const fn missing_placeholder(self) -> &'static str {
        match self {
            Self::DocSearch => "No documentation found.",
            Self::CodeQuery => "No code examples found.",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "doc_search" | "docs" => Ok(Self::DocSearch),
            "code_query" | "code" => Ok(Self::CodeQuery),
            other => Err(format!("unknown agent: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_routing_order() {
        assert!(AgentId::DocSearch < AgentId::CodeQuery);
        assert_eq!(AgentId::ALL, [AgentId::DocSearch, AgentId::CodeQuery]);
    }

    #[test]
    fn test_parse() {
        assert_eq!("doc_search".parse(), Ok(AgentId::DocSearch));
        assert_eq!("Code-Query".parse(), Ok(AgentId::CodeQuery));
        assert!("oracle".parse::<AgentId>().is_err());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&AgentId::CodeQuery).unwrap_or_default();
        assert_eq!(json, "\"code_query\"");
    }
}
