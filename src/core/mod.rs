//! Domain values shared by the engine, the backends, and the CLI.
//!
//! Everything here is created at the start of one orchestration run and
//! dropped at its end. None of these types hold references to the
//! workflow or to another run.

pub mod agent_id;
pub mod outcome;
pub mod query;
pub mod routing;

pub use agent_id::AgentId;
pub use outcome::{AgentOutcome, Outcomes};
pub use query::Query;
pub use routing::{Route, RoutingDecision};
