//! # ghosthand-core
//!
//! The orchestration engine: seam traits, the capability registry, the
//! enrollment ledger, the goal guard, and the `Orchestrator` that drives a
//! plan from planning through execution to the history store.

pub mod guard;
pub mod ledger;
pub mod orchestrator;
pub mod registry;
pub mod traits;

pub use guard::{GoalGuard, DEFAULT_DENY_PHRASES};
pub use orchestrator::{Orchestrator, OrchestratorSettings, RunState};
pub use registry::CapabilityRegistry;
