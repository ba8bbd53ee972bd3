//! Web documentation search backend.
//!
//! Queries the Tavily search API and renders the hits as plain text for
//! the synthesizer. Without an API key every call fails with
//! [`BackendError::NotConfigured`], which the orchestrator records as a
//! failure outcome.

use std::fmt::Write;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Backend;
use crate::core::AgentId;
use crate::error::BackendError;

/// Default Tavily search endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";

/// Maximum hits requested per query.
const MAX_RESULTS: u32 = 5;

/// Maximum characters of page content kept per hit.
const MAX_EXCERPT_CHARS: usize = 800;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: u32,
    search_depth: &'static str,
    include_answer: bool,
}

/// A single search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Page URL.
    #[serde(default)]
    pub url: String,
    /// Extracted page content.
    #[serde(default)]
    pub content: String,
}

/// Response body from the search API.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    /// Short generated answer, when requested and available.
    #[serde(default)]
    pub answer: Option<String>,
    /// Ranked hits.
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

/// Documentation search over the web.
pub struct WebDocSearch {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl WebDocSearch {
    /// Creates a backend using the default endpoint.
    #[must_use]
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Overrides the search endpoint (proxies, test servers).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl std::fmt::Debug for WebDocSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDocSearch")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for WebDocSearch {
    fn id(&self) -> AgentId {
        AgentId::DocSearch
    }

    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn invoke(&self, query: &str) -> Result<String, BackendError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| BackendError::NotConfigured("TAVILY_API_KEY is not set".to_string()))?;

        let body = SearchRequest {
            query,
            max_results: MAX_RESULTS,
            search_depth: "basic",
            include_answer: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BackendError::Http {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        let parsed: SearchResponse = response.json().await?;
        debug!(hits = parsed.results.len(), "documentation search completed");
        Ok(render_results(&parsed))
    }
}

/// Renders search hits as a numbered plain-text list.
#[must_use]
pub fn render_results(response: &SearchResponse) -> String {
    if response.results.is_empty() && response.answer.is_none() {
        return "No documentation results found for this query.".to_string();
    }

    let mut out = String::new();
    if let Some(answer) = response.answer.as_deref().filter(|a| !a.trim().is_empty()) {
        let _ = writeln!(out, "Summary: {}\n", answer.trim());
    }

    for (idx, hit) in response.results.iter().enumerate() {
        let excerpt: String = hit.content.chars().take(MAX_EXCERPT_CHARS).collect();
        let ellipsis = if hit.content.chars().count() > MAX_EXCERPT_CHARS {
            "..."
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "{n}. {title}\n   Source: {url}\n   {excerpt}{ellipsis}\n",
            n = idx + 1,
            title = hit.title.trim(),
            url = hit.url,
            excerpt = excerpt.trim(),
        );
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_results_with_answer() {
        let response: SearchResponse = serde_json::from_str(
            r#"{
                "answer": "Use python-oracledb.",
                "results": [
                    {"title": "python-oracledb docs", "url": "https://example.org/oracledb", "content": "Connect with oracledb.connect()", "score": 0.9}
                ]
            }"#,
        )
        .unwrap_or_else(|_| unreachable!());
        let text = render_results(&response);
        assert!(text.starts_with("Summary: Use python-oracledb."));
        assert!(text.contains("1. python-oracledb docs"));
        assert!(text.contains("Source: https://example.org/oracledb"));
    }

    #[test]
    fn test_render_results_truncates_long_content() {
        let response = SearchResponse {
            answer: None,
            results: vec![SearchHit {
                title: "t".to_string(),
                url: "u".to_string(),
                content: "x".repeat(MAX_EXCERPT_CHARS + 10),
            }],
        };
        let text = render_results(&response);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn test_render_empty() {
        let response = SearchResponse {
            answer: None,
            results: Vec::new(),
        };
        assert!(render_results(&response).starts_with("No documentation results"));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let backend = WebDocSearch::new(Some("  ".to_string()));
        let err = backend.invoke("what is a pool").await;
        assert!(matches!(err, Err(BackendError::NotConfigured(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let backend = WebDocSearch::new(Some("tvly-secret".to_string()));
        let dbg = format!("{backend:?}");
        assert!(!dbg.contains("tvly-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
