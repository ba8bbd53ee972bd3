//! Output formatting for command results.

#![allow(clippy::format_push_string)]

use serde::Serialize;

use crate::agent::{KeywordHits, QueryResult};
use crate::backend::snippets::Snippet;
use crate::core::RoutingDecision;

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
    /// One compact JSON document per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name; unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Serializes `value` in this format's JSON flavour.
    ///
    /// Text falls back to pretty JSON.
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        let rendered = match self {
            Self::Ndjson => serde_json::to_string(value),
            Self::Text | Self::Json => serde_json::to_string_pretty(value),
        };
        let mut out = rendered.unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"));
        out.push('\n');
        out
    }
}

/// Renders an answered query.
pub fn format_query_result(result: &QueryResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = result.response.trim_end().to_string();
            out.push_str("\n\n---\n");
            let timings: Vec<String> = result
                .timing
                .entries()
                .into_iter()
                .map(|(key, d)| format!("{key}: {:.2}s", d.as_secs_f64()))
                .collect();
            out.push_str(&format!("Agents: {} | {}", result.decision, timings.join(" | ")));
            if result.is_degraded() {
                let failed: Vec<&str> = result.failed_agents.iter().map(|a| a.as_str()).collect();
                out.push_str(&format!("\nFailed agents: {}", failed.join(", ")));
            }
            out.push('\n');
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(result),
    }
}

/// Renders a routing decision with the keywords that produced it.
pub fn format_classification(
    decision: &RoutingDecision,
    hits: &KeywordHits,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = format!("Route: {decision}\n");
            if hits.explanation.is_empty() && hits.code.is_empty() {
                out.push_str("No keywords matched; querying all agents.\n");
            } else {
                out.push_str(&format!("Explanation keywords: {}\n", join_or_dash(&hits.explanation)));
                out.push_str(&format!("Code keywords: {}\n", join_or_dash(&hits.code)));
            }
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(&serde_json::json!({
            "decision": decision,
            "keywords": hits,
        })),
    }
}

/// Renders a snippet listing.
pub fn format_snippet_list(snippets: &[Snippet], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if snippets.is_empty() {
                return "No snippets found.\n".to_string();
            }
            let mut out = format!("{:<6} {:<12} {:<12} TITLE\n", "ID", "LANGUAGE", "CATEGORY");
            for s in snippets {
                out.push_str(&format!(
                    "{:<6} {:<12} {:<12} {}\n",
                    s.id,
                    truncate_str(&s.language, 12),
                    truncate_str(&s.category, 12),
                    s.title
                ));
            }
            out
        }
        OutputFormat::Json => format.to_json(snippets),
        OutputFormat::Ndjson => snippets.iter().map(|s| format.to_json(s)).collect(),
    }
}

/// Renders one snippet in full.
pub fn format_snippet(snippet: &Snippet, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut out = format!("#{} {}\n", snippet.id, snippet.title);
            out.push_str(&format!("Language: {}", snippet.language));
            if let Some(framework) = &snippet.framework {
                out.push_str(&format!(" ({framework})"));
            }
            out.push_str(&format!(
                "\nCategory: {} | Difficulty: {}\n",
                snippet.category, snippet.difficulty
            ));
            if !snippet.tags.is_empty() {
                out.push_str(&format!("Tags: {}\n", snippet.tags));
            }
            if !snippet.description.is_empty() {
                out.push_str(&format!("\n{}\n", snippet.description));
            }
            out.push_str(&format!("\n{}\n", snippet.code.trim_end()));
            out
        }
        OutputFormat::Json | OutputFormat::Ndjson => format.to_json(snippet),
    }
}

fn join_or_dash(words: &[&str]) -> String {
    if words.is_empty() {
        "-".to_string()
    } else {
        words.join(", ")
    }
}

/// Truncates to at most `max_len` bytes on a char boundary, marking the cut.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let budget = max_len.saturating_sub(3);
    let end = (0..=budget).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::agent::timing::TimingRecorder;
    use crate::core::AgentId;

    fn result(failed: Vec<AgentId>) -> QueryResult {
        QueryResult {
            response: "Use a binary search.\n".to_string(),
            timing: TimingRecorder::new().finish(Duration::from_millis(2500)),
            decision: RoutingDecision::all(),
            failed_agents: failed,
            trace_id: Uuid::nil(),
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("ndjson"), OutputFormat::Ndjson);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("bogus"), OutputFormat::Text);
    }

    #[test]
    fn test_ndjson_is_single_line() {
        let out = OutputFormat::Ndjson.to_json(&serde_json::json!({"a": [1, 2]}));
        assert_eq!(out, "{\"a\":[1,2]}\n");
    }

    #[test]
    fn test_query_result_text_footer() {
        let out = format_query_result(&result(Vec::new()), OutputFormat::Text);
        assert!(out.starts_with("Use a binary search.\n\n---\n"));
        assert!(out.contains("analyze: 0.00s"));
        assert!(out.contains("total: 2.50s"));
        assert!(!out.contains("Failed agents"));
    }

    #[test]
    fn test_query_result_text_lists_failures() {
        let out = format_query_result(&result(vec![AgentId::DocSearch]), OutputFormat::Text);
        assert!(out.contains("Failed agents: doc_search"));
    }

    #[test]
    fn test_query_result_json() {
        let out = format_query_result(&result(Vec::new()), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap_or_default();
        assert_eq!(value["timing"]["total"], 2.5);
        assert_eq!(value["decision"], serde_json::json!(["doc_search", "code_query"]));
    }

    #[test]
    fn test_classification_fallback_text() {
        let out = format_classification(
            &RoutingDecision::all(),
            &KeywordHits::default(),
            OutputFormat::Text,
        );
        assert!(out.contains("No keywords matched"));
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("javascript-framework", 10), "javascr...");
        assert_eq!(truncate_str("日本語のテキスト", 8), "日...");
    }
}
