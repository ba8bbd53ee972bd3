//! Execution stage: invokes the routed backends and collects outcomes.
//!
//! One agent runs inline on the driving task. Two or more run
//! concurrently on a [`JoinSet`] holding exactly one task per routed
//! agent, and are all joined before returning; no worker outlives the
//! call. Backend errors become
//! [`AgentOutcome::Failure`] entries and never abort the stage.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{Instrument, debug, warn};

use super::telemetry::{SPAN_BACKEND_INVOKE, StageSpan, TraceContext};
use crate::backend::{Backend, BackendSet};
use crate::core::{AgentId, AgentOutcome, Outcomes, Query, Route, RoutingDecision};
use crate::error::BackendError;

/// Runs every agent in `decision` and returns one outcome per agent.
///
/// Failures are also recorded on `stage` as `<agent>.error` attributes.
pub async fn execute(
    backends: &BackendSet,
    decision: &RoutingDecision,
    query: &Query,
    stage: &mut StageSpan,
) -> Outcomes {
    let cx = stage.context();
    let outcomes = match decision.route() {
        Route::Skip => Outcomes::new(),
        Route::Single(agent) => {
            let outcome = invoke(backends.get(agent), agent, query.clone(), cx).await;
            std::iter::once((agent, outcome)).collect()
        }
        Route::Parallel => fan_out(backends, decision, query, &cx).await,
    };

    for (agent, outcome) in outcomes.iter() {
        stage.set(format!("{agent}.output_length"), outcome.output_len());
        if let AgentOutcome::Failure(err) = outcome {
            stage.set(format!("{agent}.error"), true);
            stage.set(format!("{agent}.error.message"), err.to_string());
        }
    }
    outcomes
}

/// Invokes all agents concurrently, one worker each, and joins them all.
async fn fan_out(
    backends: &BackendSet,
    decision: &RoutingDecision,
    query: &Query,
    cx: &TraceContext,
) -> Outcomes {
    let mut workers = JoinSet::new();

    for agent in decision.iter() {
        let backend = backends.get(agent);
        let q = query.clone();
        let worker_cx = cx.clone();
        let scope = cx.span().clone();

        workers.spawn(
            async move { (agent, invoke(backend, agent, q, worker_cx).await) }.instrument(scope),
        );
    }

    let mut outcomes = Outcomes::new();
    let mut join_errors = Vec::new();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((agent, outcome)) => outcomes.insert(agent, outcome),
            Err(e) => {
                warn!(error = %e, "backend worker did not complete");
                join_errors.push(e.to_string());
            }
        }
    }

    // A join error does not name its agent; fill every gap with it.
    if !join_errors.is_empty() {
        let detail = join_errors.join("; ");
        for agent in decision.iter() {
            if outcomes.get(agent).is_none() {
                outcomes.insert(agent, AgentOutcome::Failure(BackendError::Worker(detail.clone())));
            }
        }
    }

    outcomes
}

/// Invokes one backend under its own span and converts the result.
async fn invoke(
    backend: Option<Arc<dyn Backend>>,
    agent: AgentId,
    query: Query,
    cx: TraceContext,
) -> AgentOutcome {
    let mut span = cx.start_span(SPAN_BACKEND_INVOKE);
    span.set("agent", agent.as_str());

    let Some(backend) = backend else {
        let err = BackendError::NotRegistered(agent.to_string());
        span.record_error(&err);
        warn!(%agent, "no backend registered");
        return AgentOutcome::Failure(err);
    };
    span.set("backend", backend.name());

    let local = span.span().clone();
    let result = backend.invoke(query.as_str()).instrument(local).await;

    match &result {
        Ok(text) => {
            span.set("output_length", text.len());
            debug!(%agent, backend = backend.name(), output_len = text.len(), "backend succeeded");
        }
        Err(e) => {
            span.record_error(e);
            warn!(%agent, backend = backend.name(), error = %e, "backend failed");
        }
    }
    result.into()
}
