//! Backend agents the orchestrator fans out to.
//!
//! A backend is an opaque, independently fallible, independently latent
//! function from query text to result text. The orchestrator only sees
//! the [`Backend`] trait; concrete implementations live in submodules.
//!
//! ```text
//! Workflow
//!   └── Coordinator
//!         ├── Timeout<WebDocSearch>      (AgentId::DocSearch)
//!         └── Timeout<CodeSnippetSearch> (AgentId::CodeQuery)
//! ```

pub mod doc_search;
pub mod snippets;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::AgentId;
use crate::error::BackendError;

pub use doc_search::WebDocSearch;
pub use snippets::{CodeSnippetSearch, NewSnippet, Snippet, SnippetFilter, SnippetStore};

/// Contract every backend agent satisfies.
///
/// Implementations must be callable from any worker task, so they are
/// `Send + Sync` and take the query by reference.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The agent slot this backend fills.
    fn id(&self) -> AgentId;

    /// Implementation name for logs and span attributes.
    fn name(&self) -> &'static str;

    /// Runs the backend against `query`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on any transport, storage, or timeout
    /// failure. Callers record the error; they never retry.
    async fn invoke(&self, query: &str) -> Result<String, BackendError>;
}

/// Bounds a backend call with a deadline.
///
/// A call that exceeds the deadline resolves to
/// [`BackendError::Timeout`] and the in-flight future is dropped.
pub struct Timeout {
    inner: Arc<dyn Backend>,
    after: Duration,
}

impl Timeout {
    /// Wraps `inner` with a deadline of `after`.
    pub fn new(inner: Arc<dyn Backend>, after: Duration) -> Self {
        Self { inner, after }
    }
}

#[async_trait]
impl Backend for Timeout {
    fn id(&self) -> AgentId {
        self.inner.id()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn invoke(&self, query: &str) -> Result<String, BackendError> {
        tokio::time::timeout(self.after, self.inner.invoke(query))
            .await
            .map_err(|_| BackendError::Timeout { after: self.after })?
    }
}

/// Registry of backends keyed by the agent they serve.
///
/// Built once with the workflow and read-only afterwards.
#[derive(Clone, Default)]
pub struct BackendSet {
    backends: BTreeMap<AgentId, Arc<dyn Backend>>,
}

impl BackendSet {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `backend` under its own [`Backend::id`], replacing any
    /// earlier registration for that agent.
    #[must_use]
    pub fn with(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backends.insert(backend.id(), backend);
        self
    }

    /// Wraps every registered backend in a [`Timeout`] of `after`.
    #[must_use]
    pub fn with_timeout(self, after: Duration) -> Self {
        let backends = self
            .backends
            .into_iter()
            .map(|(id, b)| (id, Arc::new(Timeout::new(b, after)) as Arc<dyn Backend>))
            .collect();
        Self { backends }
    }

    /// Backend registered for `agent`.
    #[must_use]
    pub fn get(&self, agent: AgentId) -> Option<Arc<dyn Backend>> {
        self.backends.get(&agent).cloned()
    }

    /// Number of registered backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.backends.iter().map(|(id, b)| (id.as_str(), b.name())))
            .finish()
    }
}
