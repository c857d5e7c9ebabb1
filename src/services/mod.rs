//! Service layer: the orchestration core's components.

pub mod assignment;
pub mod context_cache;
pub mod dependency_resolver;
pub mod execution_log;
pub mod health;
pub mod issue_sync;
pub mod scheduler;

pub use assignment::{Assignment, AssignmentManager, Release};
pub use context_cache::{compute_fingerprint, Claim, ContextCache, Fingerprint, FlightState};
pub use dependency_resolver::{DependencyGraph, DependencyResolver};
pub use execution_log::{ExecutionLog, LogCursor};
pub use health::{HealthAggregator, LatencyWindow};
pub use issue_sync::{IssueSynchronizer, SyncEvent, SyncHandle, SyncPolicy};
pub use scheduler::DependencyScheduler;
