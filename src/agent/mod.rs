//! Agent orchestration engine.
//!
//! Classifies a query, fans it out to the routed backend agents, and
//! synthesizes one answer with an LLM, recording per-stage timing and
//! trace spans along the way.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator::query
//!   └── Workflow::run
//!       ├── classify (keyword routing)          → StageEvent::Classified
//!       ├── coordinator::execute
//!       │   ├── 0 agents → skipped              → StageEvent::AgentsSkipped
//!       │   ├── 1 agent  → inline call          → StageEvent::SingleAgent
//!       │   └── 2 agents → bounded JoinSet      → StageEvent::ParallelAgents
//!       └── Synthesizer (one LLM call)          → StageEvent::Synthesized
//! ```

pub mod classifier;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod message;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod result;
pub mod status;
pub mod synthesizer;
pub mod telemetry;
pub mod timing;
pub mod traits;
pub mod workflow;

// Re-export key types
pub use classifier::{KeywordHits, classify};
pub use config::{AgentConfig, TelemetryConfig};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::Orchestrator;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use result::QueryResult;
pub use status::{StatusEvent, StatusLabel, StatusObserver};
pub use synthesizer::{Synthesizer, SynthesizerAgent};
pub use telemetry::{ExportingTracer, NoopTracer, SpanRecord, TraceContext, Tracer};
pub use timing::TimingReport;
pub use traits::Agent;
pub use workflow::{Router, Stage, StageEvent, Workflow, WorkflowState};
