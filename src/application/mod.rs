//! Application layer: the orchestrator and the runner that drives it.

pub mod fleet_runner;
pub mod orchestrator;

pub use fleet_runner::{FleetRunner, RunSummary};
pub use orchestrator::{Dispatch, FleetState, Orchestrator, OrchestratorSettings};
