//! Error types for code-assistant.
//!
//! Each layer owns its error enum. Backend failures are converted into
//! data by the coordinator and never escape a run; only synthesis
//! failures propagate to the caller of a query.

use std::time::Duration;

use thiserror::Error;

/// Result alias for top-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// LLM provider or synthesis failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Snippet store failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the LLM provider layer and the synthesis stage.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured.
    #[error("API key missing: set OPENAI_API_KEY or CODE_ASSIST_API_KEY")]
    ApiKeyMissing,

    /// The provider rejected or failed the request.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error text.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// Unknown provider name in configuration.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The configured provider name.
        name: String,
    },

    /// A stage did not finish within its bound.
    #[error("{stage} timed out after {}s", after.as_secs_f64())]
    Timeout {
        /// Stage that timed out.
        stage: &'static str,
        /// Configured bound.
        after: Duration,
    },

    /// The synthesis call returned no usable text.
    #[error("synthesis failed: {message}")]
    Synthesis {
        /// Failure detail.
        message: String,
    },
}

/// Errors raised by backend agents.
///
/// These never propagate out of a run; the coordinator records them as
/// [`AgentOutcome::Failure`](crate::core::AgentOutcome::Failure).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Transport-level request failure.
    #[error("request failed: {0}")]
    Request(String),

    /// Non-success HTTP status from a remote backend.
    #[error("HTTP {status}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// Missing backend configuration (for example an API key).
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// Local storage failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// The call exceeded its timeout.
    #[error("timed out after {}s", after.as_secs_f64())]
    Timeout {
        /// Configured bound.
        after: Duration,
    },

    /// No backend is registered for the routed agent.
    #[error("no backend registered for {0}")]
    NotRegistered(String),

    /// The worker running the backend panicked or was cancelled.
    #[error("worker failed: {0}")]
    Worker(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        err.status().map_or_else(
            || Self::Request(err.to_string()),
            |status| Self::Http {
                status: status.as_u16(),
                body: err.to_string(),
            },
        )
    }
}

impl From<StorageError> for BackendError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Errors from the code-snippet store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store has not been initialized.
    #[error("snippet store not initialized: run `code-assistant snippets init` first")]
    NotInitialized,

    /// Record not found.
    #[error("snippet not found: {0}")]
    NotFound(i64),

    /// Filesystem failure while preparing the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors exported by the telemetry layer.
///
/// Never surfaced to callers; the exporter logs and drops them.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Could not reach the collector.
    #[error("collector unreachable at {endpoint}: {source}")]
    Connect {
        /// `host:port` of the collector.
        endpoint: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The collector did not accept a connection in time.
    #[error("collector at {endpoint} did not answer within {timeout_ms}ms")]
    ConnectTimeout {
        /// `host:port` of the collector.
        endpoint: String,
        /// Connect budget in milliseconds.
        timeout_ms: u128,
    },

    /// No Tokio runtime to run the exporter on.
    #[error("span export needs a Tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// Span record could not be serialized.
    #[error("span serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Write to the collector failed.
    #[error("export write failed: {0}")]
    Write(#[from] std::io::Error),
}

/// Errors from CLI command execution.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Invalid command-line argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("{0}")]
    ExecutionFailed(String),

    /// Output formatting failed.
    #[error("output format error: {0}")]
    OutputFormat(String),
}
