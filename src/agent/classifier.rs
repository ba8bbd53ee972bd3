//! Keyword-based query classification.
//!
//! Maps a raw query to the set of backend agents worth asking. Pure and
//! deterministic: no I/O, no model call.

use serde::Serialize;
use tracing::debug;

use crate::core::{AgentId, RoutingDecision};

/// Keywords that signal a request for explanation or documentation.
pub const EXPLANATION_KEYWORDS: &[&str] = &[
    "how",
    "what",
    "why",
    "explain",
    "concept",
    "best practice",
    "documentation",
    "tutorial",
    "guide",
    "learn",
];

/// Keywords that signal a request for code, including domain and
/// language/framework tokens.
pub const CODE_KEYWORDS: &[&str] = &[
    "code",
    "example",
    "snippet",
    "implement",
    "show me",
    "sample",
    "function",
    "class",
    "script",
    "database",
    "oracle",
    "connect",
    "sql",
    "query",
    "table",
    "insert",
    "select",
    "python",
    "java",
    "fastapi",
    "langchain",
];

/// Keywords from each category found in a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeywordHits {
    /// Matched explanation keywords.
    pub explanation: Vec<&'static str>,
    /// Matched code keywords.
    pub code: Vec<&'static str>,
}

impl KeywordHits {
    /// Scans `query` (case-insensitively) for every keyword.
    ///
    /// Case is folded through uppercase first, so characters such as `ı`
    /// and `ſ` match the same keywords as their uppercase forms.
    #[must_use]
    pub fn scan(query: &str) -> Self {
        let text = query.to_uppercase().to_lowercase();
        let hits = |keywords: &[&'static str]| -> Vec<&'static str> {
            keywords
                .iter()
                .copied()
                .filter(|kw| contains_at_word_start(&text, kw))
                .collect()
        };
        Self {
            explanation: hits(EXPLANATION_KEYWORDS),
            code: hits(CODE_KEYWORDS),
        }
    }

    /// Routing decision implied by these hits.
    ///
    /// One category alone selects its agent; both or neither select all.
    #[must_use]
    pub fn decision(&self) -> RoutingDecision {
        match (self.explanation.is_empty(), self.code.is_empty()) {
            (false, true) => RoutingDecision::new([AgentId::DocSearch]),
            (true, false) => RoutingDecision::new([AgentId::CodeQuery]),
            _ => RoutingDecision::all(),
        }
    }
}

/// Classifies a query into the agents that should handle it.
///
/// Never returns an empty decision: a query with no keyword hits, blank
/// input included, routes to every agent.
#[must_use]
pub fn classify(query: &str) -> RoutingDecision {
    let hits = KeywordHits::scan(query);
    let decision = hits.decision();
    debug!(
        explanation = ?hits.explanation,
        code = ?hits.code,
        decision = %decision,
        "query classified"
    );
    decision
}

/// Substring match that must begin at a word boundary.
///
/// `"show"` does not contain `"how"`, but `"examples"` contains `"example"`.
fn contains_at_word_start(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(idx, _)| {
        text[..idx]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    fn only(agent: AgentId) -> RoutingDecision {
        RoutingDecision::new([agent])
    }

    #[test_case("How do I connect to Oracle database in Python?", &AgentId::ALL ; "explanation and code")]
    #[test_case("show me code for a binary search", &[AgentId::CodeQuery] ; "code only")]
    #[test_case("Explain the concept of eventual consistency", &[AgentId::DocSearch] ; "explanation only")]
    #[test_case("binary search trees", &AgentId::ALL ; "no keywords")]
    #[test_case("", &AgentId::ALL ; "empty")]
    #[test_case("   \t ", &AgentId::ALL ; "whitespace")]
    #[test_case("WHY IS MY SELECT SLOW", &AgentId::ALL ; "uppercase both")]
    #[test_case("any examples of pagination?", &[AgentId::CodeQuery] ; "plural keyword")]
    #[test_case("best practices for logging", &[AgentId::DocSearch] ; "multi word keyword")]
    #[test_case("ınsert a row", &[AgentId::CodeQuery] ; "dotless i")]
    #[test_case("ſql tutorial", &AgentId::ALL ; "long s")]
    fn test_classify(query: &str, expected: &[AgentId]) {
        assert_eq!(classify(query), RoutingDecision::new(expected.iter().copied()));
    }

    #[test]
    fn test_keyword_must_start_a_word() {
        assert!(contains_at_word_start("how to", "how"));
        assert!(contains_at_word_start("so, how?", "how"));
        assert!(!contains_at_word_start("show", "how"));
        assert!(contains_at_word_start("show how", "how"));
        assert!(contains_at_word_start("connection pool", "connect"));
        assert!(!contains_at_word_start("unclassified", "class"));
    }

    #[test]
    fn test_scan_reports_hits() {
        let hits = KeywordHits::scan("How do I connect to Oracle database in Python?");
        assert_eq!(hits.explanation, vec!["how"]);
        assert_eq!(hits.code, vec!["database", "oracle", "connect", "python"]);
    }

    #[test]
    fn test_non_ascii_matches_uppercase_form() {
        for query in ["ınsert a row", "ſhow me code", "WHY ıS İT SLOW", "straße sql"] {
            assert_eq!(classify(query), classify(&query.to_uppercase()), "{query}");
        }
    }

    #[test]
    fn test_single_category_routes_single_agent() {
        assert_eq!(classify("write a function"), only(AgentId::CodeQuery));
        assert_eq!(classify("a guide to async"), only(AgentId::DocSearch));
    }

    proptest! {
        #[test]
        fn prop_never_empty(query in ".{0,80}") {
            prop_assert!(!classify(&query).is_empty());
        }

        #[test]
        fn prop_case_insensitive(query in "\\PC{0,80}") {
            prop_assert_eq!(classify(&query), classify(&query.to_uppercase()));
        }

        #[test]
        fn prop_no_hits_routes_everywhere(query in "[bjkxz ]{0,40}") {
            prop_assert_eq!(classify(&query), RoutingDecision::all());
        }
    }
}
