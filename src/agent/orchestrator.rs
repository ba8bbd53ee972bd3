//! Run entry point: one query in, one response plus timings out.
//!
//! Wraps [`Workflow::run`] with the root trace span, the status stream,
//! and timing assembly.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{Instrument, info};

use super::client::create_provider;
use super::config::AgentConfig;
use super::prompt::PromptSet;
use super::result::QueryResult;
use super::status::{
    ORCHESTRATOR_LABEL, SYNTHESIZER_LABEL, StatusEvent, StatusLabel, StatusObserver,
};
use super::synthesizer::{Synthesizer, SynthesizerAgent};
use super::telemetry::{SPAN_QUERY, TraceContext, tracer_from_config};
use super::timing::TimingRecorder;
use super::workflow::{StageEvent, Workflow};
use crate::backend::{BackendSet, CodeSnippetSearch, WebDocSearch};
use crate::core::{AgentId, AgentOutcome, Query};
use crate::error::AgentError;

/// Handle to a built workflow; cheap to clone and share across runs.
#[derive(Clone)]
pub struct Orchestrator {
    workflow: Arc<Workflow>,
}

impl Orchestrator {
    /// Wraps an already-built workflow.
    #[must_use]
    pub fn new(workflow: Workflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
        }
    }

    /// Builds the production workflow from configuration.
    ///
    /// Span export needs a Tokio runtime; outside one, spans are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedProvider`] for an unknown provider.
    pub fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        let provider = create_provider(config)?;
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let synthesizer = Synthesizer::new(
            provider,
            Box::new(SynthesizerAgent::new(config, prompts.synthesizer)),
            config.timeout,
        );
        let backends = BackendSet::new()
            .with(Arc::new(WebDocSearch::new(config.tavily_api_key.clone())))
            .with(Arc::new(CodeSnippetSearch::new(config.snippet_db.clone())))
            .with_timeout(config.backend_timeout);
        let tracer = tracer_from_config(&config.telemetry);

        Ok(Self::new(Workflow::new(backends, synthesizer, tracer)))
    }

    /// The underlying workflow.
    #[must_use]
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Answers one query.
    ///
    /// Backend failures degrade the answer but never fail the call.
    /// `observer`, when given, receives status events in stage order.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] only when synthesis fails.
    pub async fn query(
        &self,
        query: impl Into<Query>,
        observer: Option<&dyn StatusObserver>,
    ) -> Result<QueryResult, AgentError> {
        let query = query.into();
        let started = Instant::now();
        let notify = |event: StatusEvent| {
            if let Some(observer) = observer {
                observer.notify(&event);
            }
        };

        let mut root = TraceContext::root(Arc::clone(self.workflow.tracer())).start_span(SPAN_QUERY);
        root.set("query", query.as_str());
        let trace_id = root.context().trace_id();

        notify(StatusEvent::new(
            ORCHESTRATOR_LABEL,
            StatusLabel::Running,
            "Analyzing query...",
        ));

        let mut timing = TimingRecorder::new();
        let mut on_stage = |event: &StageEvent| {
            record_timing(&mut timing, event);
            for status in status_events(event) {
                notify(status);
            }
        };

        let scope = root.span().clone();
        let result = self
            .workflow
            .run(query, &root.context(), &mut on_stage)
            .instrument(scope)
            .await;
        let total = started.elapsed();
        root.set("total_time_ms", total.as_secs_f64() * 1000.0);

        let state = match result {
            Ok(state) => state,
            Err(e) => {
                root.record_error(&e);
                notify(StatusEvent::new(
                    ORCHESTRATOR_LABEL,
                    StatusLabel::Failed,
                    e.to_string(),
                ));
                return Err(e);
            }
        };

        let response = state.response().unwrap_or_default().to_string();
        root.set("response_length", response.len());
        root.set("decision", state.decision().to_string());

        notify(StatusEvent::new(
            ORCHESTRATOR_LABEL,
            StatusLabel::Complete,
            format!("Response generated in {:.1}s", total.as_secs_f64()),
        ));

        let failed_agents: Vec<AgentId> = state
            .outcomes()
            .iter()
            .filter(|(_, outcome)| outcome.is_failure())
            .map(|(agent, _)| agent)
            .collect();
        info!(
            decision = %state.decision(),
            failed = failed_agents.len(),
            elapsed_ms = total.as_millis(),
            "query answered"
        );

        Ok(QueryResult {
            response,
            timing: timing.finish(total),
            decision: state.decision().clone(),
            failed_agents,
            trace_id,
        })
    }

    /// Waits (bounded) for pending spans to be exported.
    pub async fn flush(&self) {
        self.workflow.tracer().flush().await;
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("workflow", &self.workflow)
            .finish()
    }
}

/// Charges a stage's duration to the matching timing keys.
fn record_timing(timing: &mut TimingRecorder, event: &StageEvent) {
    match event {
        StageEvent::Classified { elapsed, .. } => timing.analyze(*elapsed),
        StageEvent::SingleAgent { agent, elapsed, .. } => timing.agent(*agent, *elapsed),
        StageEvent::ParallelAgents { outcomes, elapsed } => {
            timing.fan_out(outcomes.iter().map(|(agent, _)| agent), *elapsed);
        }
        StageEvent::AgentsSkipped { .. } => {}
        StageEvent::Synthesized { elapsed, .. } => timing.combine(*elapsed),
    }
}

/// Status notifications for one finished stage.
fn status_events(event: &StageEvent) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    match event {
        StageEvent::Classified { decision, .. } => {
            let labels: Vec<&str> = decision.iter().map(AgentId::label).collect();
            let targets = if labels.is_empty() {
                "none".to_string()
            } else {
                labels.join(", ")
            };
            events.push(StatusEvent::new(
                ORCHESTRATOR_LABEL,
                StatusLabel::Complete,
                format!("Will query: {targets}"),
            ));
            for agent in decision.iter() {
                events.push(StatusEvent::new(
                    agent.label(),
                    StatusLabel::Queued,
                    "Waiting to start",
                ));
            }
        }
        StageEvent::SingleAgent { agent, outcome, .. } => {
            push_agent_events(&mut events, *agent, outcome);
            push_synthesizing(&mut events);
        }
        StageEvent::ParallelAgents { outcomes, .. } => {
            for (agent, outcome) in outcomes.iter() {
                push_agent_events(&mut events, agent, outcome);
            }
            push_synthesizing(&mut events);
        }
        StageEvent::AgentsSkipped { .. } => {
            events.push(StatusEvent::new(
                ORCHESTRATOR_LABEL,
                StatusLabel::Complete,
                "No agents selected",
            ));
            push_synthesizing(&mut events);
        }
        StageEvent::Synthesized { response_len, .. } => {
            events.push(StatusEvent::new(
                SYNTHESIZER_LABEL,
                StatusLabel::Complete,
                format!("Response synthesized ({response_len} bytes)"),
            ));
        }
    }
    events
}

fn push_agent_events(events: &mut Vec<StatusEvent>, agent: AgentId, outcome: &AgentOutcome) {
    events.push(StatusEvent::new(
        agent.label(),
        StatusLabel::Running,
        agent.running_detail(),
    ));
    events.push(match outcome {
        AgentOutcome::Success(_) => {
            StatusEvent::new(agent.label(), StatusLabel::Complete, agent.complete_detail())
        }
        AgentOutcome::Failure(e) => {
            StatusEvent::new(agent.label(), StatusLabel::Failed, format!("Failed: {e}"))
        }
    });
}

fn push_synthesizing(events: &mut Vec<StatusEvent>) {
    events.push(StatusEvent::new(
        SYNTHESIZER_LABEL,
        StatusLabel::Running,
        "Synthesizing response...",
    ));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::{Outcomes, RoutingDecision};
    use crate::error::BackendError;

    #[test]
    fn test_classified_events_queue_each_agent() {
        let events = status_events(&StageEvent::Classified {
            decision: RoutingDecision::all(),
            elapsed: Duration::ZERO,
        });
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].detail, "Will query: Doc Search Agent, Code Query Agent");
        assert!(events[1..].iter().all(|e| e.status == StatusLabel::Queued));
    }

    #[test]
    fn test_parallel_events_in_agent_order() {
        let outcomes: Outcomes = [
            (AgentId::CodeQuery, AgentOutcome::Success("x".into())),
            (
                AgentId::DocSearch,
                AgentOutcome::Failure(BackendError::Request("down".into())),
            ),
        ]
        .into_iter()
        .collect();
        let events = status_events(&StageEvent::ParallelAgents {
            outcomes,
            elapsed: Duration::ZERO,
        });
        let summary: Vec<(&str, StatusLabel)> = events
            .iter()
            .map(|e| (e.agent_label.as_str(), e.status))
            .collect();
        assert_eq!(
            summary,
            [
                ("Doc Search Agent", StatusLabel::Running),
                ("Doc Search Agent", StatusLabel::Failed),
                ("Code Query Agent", StatusLabel::Running),
                ("Code Query Agent", StatusLabel::Complete),
                ("Synthesizer", StatusLabel::Running),
            ]
        );
    }

    #[test]
    fn test_skipped_agents_events() {
        let classified = status_events(&StageEvent::Classified {
            decision: RoutingDecision::new([]),
            elapsed: Duration::ZERO,
        });
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].detail, "Will query: none");

        let skipped = status_events(&StageEvent::AgentsSkipped {
            elapsed: Duration::ZERO,
        });
        let summary: Vec<(&str, StatusLabel, &str)> = skipped
            .iter()
            .map(|e| (e.agent_label.as_str(), e.status, e.detail.as_str()))
            .collect();
        assert_eq!(
            summary,
            [
                ("Orchestrator", StatusLabel::Complete, "No agents selected"),
                ("Synthesizer", StatusLabel::Running, "Synthesizing response..."),
            ]
        );
    }

    #[test]
    fn test_skipped_agents_charge_no_agent_time() {
        let mut timing = TimingRecorder::new();
        record_timing(
            &mut timing,
            &StageEvent::AgentsSkipped {
                elapsed: Duration::from_secs(1),
            },
        );
        record_timing(
            &mut timing,
            &StageEvent::Synthesized {
                response_len: 10,
                elapsed: Duration::from_secs(2),
            },
        );
        let report = timing.finish(Duration::from_secs(3));
        assert_eq!(report.agent(AgentId::DocSearch), Duration::ZERO);
        assert_eq!(report.agent(AgentId::CodeQuery), Duration::ZERO);
        assert_eq!(report.total(), Duration::from_secs(3));
    }

    #[test]
    fn test_fan_out_timing_split() {
        let mut timing = TimingRecorder::new();
        let outcomes: Outcomes = AgentId::ALL
            .into_iter()
            .map(|a| (a, AgentOutcome::Success(String::new())))
            .collect();
        record_timing(
            &mut timing,
            &StageEvent::ParallelAgents {
                outcomes,
                elapsed: Duration::from_secs(3),
            },
        );
        let report = timing.finish(Duration::from_secs(4));
        assert_eq!(report.agent(AgentId::DocSearch), Duration::from_millis(1500));
        assert_eq!(report.agent(AgentId::CodeQuery), Duration::from_millis(1500));
    }
}
