//! # code-assistant
//!
//! Answers developer questions by routing them to backend agents and
//! synthesizing one response.
//!
//! A query is classified by keyword into the documentation search agent,
//! the code-snippet agent, or both. Routed agents run (concurrently when
//! there are two), their outputs are combined into one LLM synthesis
//! call, and the result comes back with per-stage timings. Backend
//! failures degrade the answer; only a synthesis failure fails the query.
//!
//! ## Modules
//!
//! - [`agent`]: classifier, coordinator, workflow, synthesizer, telemetry
//! - [`backend`]: backend contract, registry, doc search, snippet store
//! - [`core`]: agent identifiers, queries, routing decisions, outcomes
//! - [`cli`]: command-line interface
//! - [`error`]: error types
//!
//! ## Example
//!
//! ```no_run
//! use code_assistant::agent::{AgentConfig, Orchestrator};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::from_env()?;
//! let orchestrator = Orchestrator::from_config(&config)?;
//! let result = orchestrator.query("how do I connect to oracle in python", None).await?;
//! println!("{}", result.response);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod backend;
pub mod cli;
pub mod core;
pub mod error;

pub use agent::{Orchestrator, QueryResult, classify};
pub use core::{AgentId, AgentOutcome, Query, RoutingDecision};
pub use error::{Error, Result};
