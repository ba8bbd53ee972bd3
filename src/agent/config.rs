//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::AgentError;

/// Default synthesis model.
const DEFAULT_SYNTHESIZER_MODEL: &str = "gpt-4o";
/// Default synthesizer max tokens.
const DEFAULT_SYNTHESIZER_MAX_TOKENS: u32 = 4096;
/// Default synthesis request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default per-backend call timeout in seconds.
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 60;
/// Default snippet database location, relative to the working directory.
const DEFAULT_SNIPPET_DB: &str = ".code-assistant/snippets.db";
/// Default trace collector host.
const DEFAULT_TRACE_HOST: &str = "localhost";
/// Default trace collector port.
const DEFAULT_TRACE_PORT: u16 = 4317;
/// Default service name attached to exported spans.
const DEFAULT_SERVICE_NAME: &str = "code-assistant";

/// Settings for the optional trace exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Ship finished spans to the collector.
    pub enabled: bool,
    /// Collector host.
    pub host: String,
    /// Collector port.
    pub port: u16,
    /// Service name stamped on every span.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: DEFAULT_TRACE_HOST.to_string(),
            port: DEFAULT_TRACE_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// `host:port` of the collector.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration for the agent system.
#[derive(Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai").
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for the synthesizer agent.
    pub synthesizer_model: String,
    /// Maximum tokens for synthesizer responses.
    pub synthesizer_max_tokens: u32,
    /// Synthesis request timeout.
    pub timeout: Duration,
    /// Deadline applied to each backend agent call.
    pub backend_timeout: Duration,
    /// API key for the web documentation search backend.
    pub tavily_api_key: Option<String>,
    /// Path to the code-snippet database.
    pub snippet_db: PathBuf,
    /// Directory containing prompt template files.
    ///
    /// When set, the synthesizer system prompt is loaded from this
    /// directory, falling back to the compiled-in default.
    pub prompt_dir: Option<PathBuf>,
    /// Trace exporter settings.
    pub telemetry: TelemetryConfig,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("synthesizer_model", &self.synthesizer_model)
            .field("synthesizer_max_tokens", &self.synthesizer_max_tokens)
            .field("timeout", &self.timeout)
            .field("backend_timeout", &self.backend_timeout)
            .field("tavily_api_key", &self.tavily_api_key.as_ref().map(|_| "<redacted>"))
            .field("snippet_db", &self.snippet_db)
            .field("prompt_dir", &self.prompt_dir)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    synthesizer_model: Option<String>,
    synthesizer_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    backend_timeout: Option<Duration>,
    tavily_api_key: Option<String>,
    snippet_db: Option<PathBuf>,
    prompt_dir: Option<PathBuf>,
    trace_enabled: Option<bool>,
    trace_host: Option<String>,
    trace_port: Option<u16>,
    service_name: Option<String>,
}

/// Parses common truthy spellings (`1`, `true`, `yes`, `on`).
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("CODE_ASSIST_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("CODE_ASSIST_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("CODE_ASSIST_BASE_URL"))
                .ok();
        }
        if self.synthesizer_model.is_none() {
            self.synthesizer_model = std::env::var("CODE_ASSIST_MODEL").ok();
        }
        if self.timeout.is_none() {
            self.timeout = std::env::var("CODE_ASSIST_SYNTHESIS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
        }
        if self.backend_timeout.is_none() {
            self.backend_timeout = std::env::var("CODE_ASSIST_BACKEND_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs);
        }
        if self.tavily_api_key.is_none() {
            self.tavily_api_key = std::env::var("TAVILY_API_KEY").ok();
        }
        if self.snippet_db.is_none() {
            self.snippet_db = std::env::var("CODE_ASSIST_SNIPPET_DB")
                .ok()
                .map(PathBuf::from);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("CODE_ASSIST_PROMPT_DIR")
                .ok()
                .map(PathBuf::from);
        }
        if self.trace_enabled.is_none() {
            self.trace_enabled = std::env::var("CODE_ASSIST_TRACE_ENABLED")
                .ok()
                .map(|v| parse_flag(&v));
        }
        if self.trace_host.is_none() {
            self.trace_host = std::env::var("CODE_ASSIST_TRACE_HOST").ok();
        }
        if self.trace_port.is_none() {
            self.trace_port = std::env::var("CODE_ASSIST_TRACE_PORT")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.service_name.is_none() {
            self.service_name = std::env::var("CODE_ASSIST_SERVICE_NAME").ok();
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the synthesizer model.
    #[must_use]
    pub fn synthesizer_model(mut self, model: impl Into<String>) -> Self {
        self.synthesizer_model = Some(model.into());
        self
    }

    /// Sets the synthesizer max tokens.
    #[must_use]
    pub const fn synthesizer_max_tokens(mut self, n: u32) -> Self {
        self.synthesizer_max_tokens = Some(n);
        self
    }

    /// Sets the synthesis request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the per-backend call timeout.
    #[must_use]
    pub const fn backend_timeout(mut self, duration: Duration) -> Self {
        self.backend_timeout = Some(duration);
        self
    }

    /// Sets the web search API key.
    #[must_use]
    pub fn tavily_api_key(mut self, key: impl Into<String>) -> Self {
        self.tavily_api_key = Some(key.into());
        self
    }

    /// Sets the snippet database path.
    #[must_use]
    pub fn snippet_db(mut self, path: impl Into<PathBuf>) -> Self {
        self.snippet_db = Some(path.into());
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Enables or disables the trace exporter.
    #[must_use]
    pub const fn trace_enabled(mut self, enabled: bool) -> Self {
        self.trace_enabled = Some(enabled);
        self
    }

    /// Sets the trace collector host.
    #[must_use]
    pub fn trace_host(mut self, host: impl Into<String>) -> Self {
        self.trace_host = Some(host.into());
        self
    }

    /// Sets the trace collector port.
    #[must_use]
    pub const fn trace_port(mut self, port: u16) -> Self {
        self.trace_port = Some(port);
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(AgentError::ApiKeyMissing)?;

        let defaults = TelemetryConfig::default();

        Ok(AgentConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            synthesizer_model: self
                .synthesizer_model
                .unwrap_or_else(|| DEFAULT_SYNTHESIZER_MODEL.to_string()),
            synthesizer_max_tokens: self
                .synthesizer_max_tokens
                .unwrap_or(DEFAULT_SYNTHESIZER_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            backend_timeout: self
                .backend_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS)),
            tavily_api_key: self.tavily_api_key.filter(|k| !k.trim().is_empty()),
            snippet_db: self
                .snippet_db
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNIPPET_DB)),
            prompt_dir: self.prompt_dir,
            telemetry: TelemetryConfig {
                enabled: self.trace_enabled.unwrap_or(defaults.enabled),
                host: self.trace_host.unwrap_or(defaults.host),
                port: self.trace_port.unwrap_or(defaults.port),
                service_name: self.service_name.unwrap_or(defaults.service_name),
            },
        })
    }
}

/// Default snippet database path, for commands that need no API key.
#[must_use]
pub fn default_snippet_db() -> PathBuf {
    std::env::var("CODE_ASSIST_SNIPPET_DB")
        .map_or_else(|_| PathBuf::from(DEFAULT_SNIPPET_DB), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.synthesizer_model, DEFAULT_SYNTHESIZER_MODEL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(
            config.backend_timeout,
            Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECS)
        );
        assert!(!config.telemetry.enabled);
        assert_eq!(config.telemetry.endpoint(), "localhost:4317");
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_blank_api_key() {
        let result = AgentConfig::builder().api_key("   ").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .provider("custom")
            .synthesizer_model("gpt-4o-mini")
            .backend_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .trace_enabled(true)
            .trace_host("jaeger")
            .trace_port(6831)
            .tavily_api_key("")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "custom");
        assert_eq!(config.synthesizer_model, "gpt-4o-mini");
        assert_eq!(config.backend_timeout, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.telemetry.enabled);
        assert_eq!(config.telemetry.endpoint(), "jaeger:6831");
        assert!(config.tavily_api_key.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = AgentConfig::builder()
            .api_key("sk-secret")
            .tavily_api_key("tvly-secret")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(!dbg.contains("tvly-secret"));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("no"));
    }
}
