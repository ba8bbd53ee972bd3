//! Synthesizer agent for merging backend outputs into one answer.
//!
//! [`SynthesizerAgent`] carries the model settings; [`Synthesizer`]
//! binds it to a provider and a deadline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::config::AgentConfig;
use super::prompt::build_synthesis_prompt;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::core::Outcomes;
use crate::error::AgentError;

/// Agent that writes the final developer-facing response.
pub struct SynthesizerAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl SynthesizerAgent {
    /// Creates a new synthesizer agent with the given configuration and system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.synthesizer_model.clone(),
            max_tokens: config.synthesizer_max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for SynthesizerAgent {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        0.0
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// The synthesis stage: one bounded LLM call per run.
pub struct Synthesizer {
    provider: Arc<dyn LlmProvider>,
    agent: Box<dyn Agent>,
    timeout: Duration,
}

impl Synthesizer {
    /// Creates a synthesizer from a provider, an agent, and a deadline.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, agent: Box<dyn Agent>, timeout: Duration) -> Self {
        Self {
            provider,
            agent,
            timeout,
        }
    }

    /// Produces the final response text for `query` from `outcomes`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Timeout`] when the call exceeds the deadline,
    /// [`AgentError::Synthesis`] when the model returns no text, or the
    /// provider's error otherwise.
    pub async fn synthesize(&self, query: &str, outcomes: &Outcomes) -> Result<String, AgentError> {
        let prompt = build_synthesis_prompt(query, outcomes);
        debug!(
            agent = self.agent.name(),
            model = self.agent.model(),
            prompt_len = prompt.len(),
            "synthesis request"
        );

        let response = tokio::time::timeout(
            self.timeout,
            self.agent.execute(self.provider.as_ref(), &prompt),
        )
        .await
        .map_err(|_| AgentError::Timeout {
            stage: "synthesis",
            after: self.timeout,
        })??;

        if response.content.trim().is_empty() {
            return Err(AgentError::Synthesis {
                message: "model returned an empty response".to_string(),
            });
        }

        debug!(
            total_tokens = response.usage.total_tokens,
            finish_reason = response.finish_reason.as_deref().unwrap_or("unknown"),
            "synthesis complete"
        );
        Ok(response.content)
    }
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("provider", &self.provider.name())
            .field("model", &self.agent.model())
            .field("timeout", &self.timeout)
            .finish()
    }
}
