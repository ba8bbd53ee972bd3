//! Workflow driver: classify, run agents, synthesize.
//!
//! ```text
//! Start → Classify ─┬─ 0 agents  → SkipAgents     ─┐
//!                   ├─ 1 agent   → SingleAgent    ─┼→ Synthesize → Done
//!                   └─ 2+ agents → ParallelAgents ─┘
//! ```
//!
//! A [`Workflow`] is built once and shared by reference across runs; it
//! holds no per-run state. Each run owns a [`WorkflowState`] and reports
//! one [`StageEvent`] after each stage finishes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug};

use super::classifier::classify;
use super::coordinator;
use super::synthesizer::Synthesizer;
use super::telemetry::{
    SPAN_ANALYZE, SPAN_CALL_AGENT, SPAN_CALL_AGENTS_PARALLEL, SPAN_COMBINE, TraceContext, Tracer,
};
use crate::backend::BackendSet;
use crate::core::{AgentId, AgentOutcome, Outcomes, Query, Route, RoutingDecision};
use crate::error::{AgentError, BackendError};

/// Workflow stages that emit a completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Query classification.
    Classify,
    /// One backend, invoked inline.
    SingleAgent,
    /// Several backends, invoked concurrently.
    ParallelAgents,
    /// No backend selected.
    SkipAgents,
    /// Final LLM synthesis.
    Synthesize,
}

impl Stage {
    /// Snake-case stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classify => "classify",
            Self::SingleAgent => "single_agent",
            Self::ParallelAgents => "parallel_agents",
            Self::SkipAgents => "skip_agents",
            Self::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion event for one stage, carrying that stage's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    /// Classification finished.
    Classified {
        /// Agents selected.
        decision: RoutingDecision,
        /// Stage duration.
        elapsed: Duration,
    },
    /// The single routed agent finished.
    SingleAgent {
        /// The agent that ran.
        agent: AgentId,
        /// Its outcome.
        outcome: AgentOutcome,
        /// Stage duration.
        elapsed: Duration,
    },
    /// Every fanned-out agent finished.
    ParallelAgents {
        /// One outcome per routed agent.
        outcomes: Outcomes,
        /// Stage duration (wall clock for the whole fan-out).
        elapsed: Duration,
    },
    /// No agent was routed.
    AgentsSkipped {
        /// Stage duration.
        elapsed: Duration,
    },
    /// Synthesis produced the final response.
    Synthesized {
        /// Response length in bytes.
        response_len: usize,
        /// Stage duration.
        elapsed: Duration,
    },
}

impl StageEvent {
    /// The stage this event completes.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Classified { .. } => Stage::Classify,
            Self::SingleAgent { .. } => Stage::SingleAgent,
            Self::ParallelAgents { .. } => Stage::ParallelAgents,
            Self::AgentsSkipped { .. } => Stage::SkipAgents,
            Self::Synthesized { .. } => Stage::Synthesize,
        }
    }

    /// Duration of the completed stage.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Classified { elapsed, .. }
            | Self::SingleAgent { elapsed, .. }
            | Self::ParallelAgents { elapsed, .. }
            | Self::AgentsSkipped { elapsed }
            | Self::Synthesized { elapsed, .. } => *elapsed,
        }
    }
}

/// Per-run record threaded through the stages.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    query: Query,
    decision: RoutingDecision,
    outcomes: Outcomes,
    response: Option<String>,
}

impl WorkflowState {
    fn new(query: Query) -> Self {
        Self {
            query,
            decision: RoutingDecision::new([]),
            outcomes: Outcomes::new(),
            response: None,
        }
    }

    /// The run's query.
    #[must_use]
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Routing decision from classification.
    #[must_use]
    pub const fn decision(&self) -> &RoutingDecision {
        &self.decision
    }

    /// Backend outcomes keyed by agent.
    #[must_use]
    pub const fn outcomes(&self) -> &Outcomes {
        &self.outcomes
    }

    /// Final response, present once synthesis has run.
    #[must_use]
    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }
}

/// Maps a query to the agents that should handle it.
pub type Router = fn(&str) -> RoutingDecision;

/// The compiled workflow: router, backends, synthesizer, and tracer.
pub struct Workflow {
    router: Router,
    backends: BackendSet,
    synthesizer: Synthesizer,
    tracer: Arc<dyn Tracer>,
}

impl Workflow {
    /// Assembles a workflow that routes with [`classify`].
    #[must_use]
    pub fn new(backends: BackendSet, synthesizer: Synthesizer, tracer: Arc<dyn Tracer>) -> Self {
        Self {
            router: classify,
            backends,
            synthesizer,
            tracer,
        }
    }

    /// Replaces the routing function used by the classify stage.
    ///
    /// A router may return an empty decision; the run then skips the
    /// agent stage and synthesizes from placeholders.
    #[must_use]
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Tracer receiving this workflow's spans.
    #[must_use]
    pub const fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    /// Registered backends.
    #[must_use]
    pub const fn backends(&self) -> &BackendSet {
        &self.backends
    }

    /// Runs one query through every stage.
    ///
    /// `on_stage` is called once per finished stage, in order, before
    /// the next stage starts. Backend failures end up in the state's
    /// outcomes; only a synthesis failure is returned as an error.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when synthesis fails or times out.
    pub async fn run(
        &self,
        query: Query,
        cx: &TraceContext,
        on_stage: &mut (dyn FnMut(&StageEvent) + Send),
    ) -> Result<WorkflowState, AgentError> {
        let mut state = WorkflowState::new(query);

        // Classify
        let elapsed = {
            let mut span = cx.start_span(SPAN_ANALYZE);
            span.set("query", state.query.as_str());
            state.decision = (self.router)(state.query.as_str());
            span.set("decision", state.decision.to_string());
            span.set("agent_count", state.decision.len());
            span.elapsed()
        };
        on_stage(&StageEvent::Classified {
            decision: state.decision.clone(),
            elapsed,
        });

        // Agents
        let event = match state.decision.route() {
            Route::Skip => {
                debug!("no agents routed; synthesizing without backend output");
                StageEvent::AgentsSkipped {
                    elapsed: Duration::ZERO,
                }
            }
            Route::Single(agent) => {
                let mut span = cx.start_span(SPAN_CALL_AGENT);
                span.set("agent", agent.as_str());
                state.outcomes =
                    coordinator::execute(&self.backends, &state.decision, &state.query, &mut span)
                        .await;
                let outcome = state.outcomes.get(agent).cloned().unwrap_or_else(|| {
                    AgentOutcome::Failure(BackendError::NotRegistered(agent.to_string()))
                });
                StageEvent::SingleAgent {
                    agent,
                    outcome,
                    elapsed: span.elapsed(),
                }
            }
            Route::Parallel => {
                let mut span = cx.start_span(SPAN_CALL_AGENTS_PARALLEL);
                span.set("agents", state.decision.to_string());
                state.outcomes =
                    coordinator::execute(&self.backends, &state.decision, &state.query, &mut span)
                        .await;
                span.set("failed_count", state.outcomes.failures());
                StageEvent::ParallelAgents {
                    outcomes: state.outcomes.clone(),
                    elapsed: span.elapsed(),
                }
            }
        };
        on_stage(&event);

        // Synthesize
        let (response, elapsed) = {
            let mut span = cx.start_span(SPAN_COMBINE);
            span.set("query", state.query.as_str());
            span.set("successful_agents", state.outcomes.len() - state.outcomes.failures());
            let scope = span.span().clone();
            match self
                .synthesizer
                .synthesize(state.query.as_str(), &state.outcomes)
                .instrument(scope)
                .await
            {
                Ok(text) => {
                    span.set("response_length", text.len());
                    let elapsed = span.elapsed();
                    (text, elapsed)
                }
                Err(e) => {
                    span.record_error(&e);
                    return Err(e);
                }
            }
        };
        on_stage(&StageEvent::Synthesized {
            response_len: response.len(),
            elapsed,
        });
        state.response = Some(response);

        Ok(state)
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("backends", &self.backends)
            .field("synthesizer", &self.synthesizer)
            .field("tracer", &self.tracer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::agent::config::AgentConfig;
    use crate::agent::message::{ChatRequest, ChatResponse};
    use crate::agent::provider::LlmProvider;
    use crate::agent::synthesizer::SynthesizerAgent;
    use crate::agent::telemetry::testing::CollectingTracer;
    use crate::agent::telemetry::{AttrValue, SPAN_BACKEND_INVOKE};
    use crate::backend::Backend;

    struct Echo;

    #[async_trait]
    impl LlmProvider for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Ok(ChatResponse {
                content: request
                    .messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default(),
                ..ChatResponse::default()
            })
        }
    }

    struct Down;

    #[async_trait]
    impl LlmProvider for Down {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            Err(AgentError::ApiRequest {
                message: "quota exceeded".into(),
                status: Some(429),
            })
        }
    }

    struct Fixed(AgentId, &'static str);

    #[async_trait]
    impl Backend for Fixed {
        fn id(&self) -> AgentId {
            self.0
        }

        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn invoke(&self, _query: &str) -> Result<String, BackendError> {
            Ok(self.1.to_string())
        }
    }

    fn workflow(provider: Arc<dyn LlmProvider>, tracer: Arc<dyn Tracer>) -> Workflow {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let synthesizer = Synthesizer::new(
            provider,
            Box::new(SynthesizerAgent::new(&config, "sys".to_string())),
            Duration::from_secs(5),
        );
        let backends = BackendSet::new()
            .with(Arc::new(Fixed(AgentId::DocSearch, "DOCS")))
            .with(Arc::new(Fixed(AgentId::CodeQuery, "CODE")));
        Workflow::new(backends, synthesizer, tracer)
    }

    async fn run(
        wf: &Workflow,
        query: &str,
    ) -> (Result<WorkflowState, AgentError>, Vec<StageEvent>) {
        let mut events = Vec::new();
        let cx = TraceContext::root(Arc::clone(wf.tracer()));
        let result = wf
            .run(Query::new(query), &cx, &mut |e: &StageEvent| events.push(e.clone()))
            .await;
        (result, events)
    }

    #[tokio::test]
    async fn test_two_agent_run_stage_order() {
        let wf = workflow(Arc::new(Echo), Arc::new(CollectingTracer::default()));
        let (result, events) = run(&wf, "How do I connect to Oracle database in Python?").await;

        let stages: Vec<Stage> = events.iter().map(StageEvent::stage).collect();
        assert_eq!(
            stages,
            [Stage::Classify, Stage::ParallelAgents, Stage::Synthesize]
        );

        let state = result.unwrap_or_else(|_| unreachable!());
        assert_eq!(state.decision(), &RoutingDecision::all());
        let response = state.response().unwrap_or_default();
        assert!(response.contains("DOCS"));
        assert!(response.contains("CODE"));
    }

    #[tokio::test]
    async fn test_single_agent_run() {
        let wf = workflow(Arc::new(Echo), Arc::new(CollectingTracer::default()));
        let (result, events) = run(&wf, "show me code for a binary search").await;

        let stages: Vec<Stage> = events.iter().map(StageEvent::stage).collect();
        assert_eq!(stages, [Stage::Classify, Stage::SingleAgent, Stage::Synthesize]);
        assert!(matches!(
            &events[1],
            StageEvent::SingleAgent { agent: AgentId::CodeQuery, outcome: AgentOutcome::Success(t), .. } if t == "CODE"
        ));

        let state = result.unwrap_or_else(|_| unreachable!());
        let response = state.response().unwrap_or_default();
        assert!(response.contains("No documentation found."));
        assert!(!response.contains("DOCS"));
    }

    #[tokio::test]
    async fn test_empty_decision_skips_agents() {
        let tracer = Arc::new(CollectingTracer::default());
        let wf =
            workflow(Arc::new(Echo), tracer.clone()).with_router(|_| RoutingDecision::new([]));
        let (result, events) = run(&wf, "How do I connect to Oracle database in Python?").await;

        let stages: Vec<Stage> = events.iter().map(StageEvent::stage).collect();
        assert_eq!(stages, [Stage::Classify, Stage::SkipAgents, Stage::Synthesize]);
        assert_eq!(events[1].elapsed(), Duration::ZERO);

        let state = result.unwrap_or_else(|_| unreachable!());
        assert!(state.decision().is_empty());
        assert!(state.outcomes().is_empty());
        let response = state.response().unwrap_or_default();
        assert!(response.contains("No documentation found."));
        assert!(response.contains("No code examples found."));
        assert!(!response.contains("DOCS") && !response.contains("CODE"));
        assert!(tracer.named(SPAN_BACKEND_INVOKE).is_empty());
    }

    #[tokio::test]
    async fn test_custom_router_overrides_classification() {
        let wf = workflow(Arc::new(Echo), Arc::new(CollectingTracer::default()))
            .with_router(|_| RoutingDecision::new([AgentId::DocSearch]));
        let (result, events) = run(&wf, "show me code for a binary search").await;

        assert!(matches!(
            &events[1],
            StageEvent::SingleAgent { agent: AgentId::DocSearch, .. }
        ));
        let state = result.unwrap_or_else(|_| unreachable!());
        assert!(state.response().unwrap_or_default().contains("DOCS"));
    }

    #[tokio::test]
    async fn test_synthesis_failure_is_returned() {
        let tracer = Arc::new(CollectingTracer::default());
        let wf = workflow(Arc::new(Down), tracer.clone());
        let (result, events) = run(&wf, "what is a mutex").await;

        assert!(matches!(result, Err(AgentError::ApiRequest { status: Some(429), .. })));
        assert_eq!(events.len(), 2);
        let combine = tracer.named(SPAN_COMBINE);
        assert_eq!(combine.len(), 1);
        assert_eq!(combine[0].attributes.get("error"), Some(&AttrValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_spans_emitted_per_stage() {
        let tracer = Arc::new(CollectingTracer::default());
        let wf = workflow(Arc::new(Echo), tracer.clone());
        let _ = run(&wf, "explain and show me code").await;

        let names: Vec<&str> = tracer.spans().iter().map(|s| s.name).collect();
        assert_eq!(names.first(), Some(&SPAN_ANALYZE));
        assert_eq!(names.iter().filter(|n| **n == SPAN_BACKEND_INVOKE).count(), 2);
        assert_eq!(names.last(), Some(&SPAN_COMBINE));
        let analyze = tracer.named(SPAN_ANALYZE);
        assert_eq!(
            analyze[0].attributes.get("decision"),
            Some(&AttrValue::Str("doc_search, code_query".into()))
        );
    }

    #[tokio::test]
    async fn test_concurrent_runs_keep_separate_state() {
        let wf = Arc::new(workflow(Arc::new(Echo), Arc::new(CollectingTracer::default())));
        let a = {
            let wf = Arc::clone(&wf);
            tokio::spawn(async move { run(&wf, "write a function").await.0.map(|s| s.decision().clone()) })
        };
        let b = {
            let wf = Arc::clone(&wf);
            tokio::spawn(async move { run(&wf, "explain the concept").await.0.map(|s| s.decision().clone()) })
        };
        let a = a.await.unwrap_or_else(|_| unreachable!()).unwrap_or_else(|_| unreachable!());
        let b = b.await.unwrap_or_else(|_| unreachable!()).unwrap_or_else(|_| unreachable!());
        assert_eq!(a, RoutingDecision::new([AgentId::CodeQuery]));
        assert_eq!(b, RoutingDecision::new([AgentId::DocSearch]));
    }
}
