//! Domain errors for the cadre orchestration core.

use thiserror::Error;
use uuid::Uuid;

use super::models::TaskStatus;

/// Format a cycle path as a human-readable string: `A -> B -> C -> A`.
fn format_cycle_path(path: &[Uuid]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised by the orchestration core.
///
/// Graph and assignment errors abort only the offending operation. Issue
/// tracker failures never surface here directly; the synchronizer absorbs
/// them and records [`OrchestrationError::SyncDegraded`] in the execution
/// log once retries run out.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Task dependency cycle detected: {}", format_cycle_path(.0))]
    CycleDetected(Vec<Uuid>),

    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: Uuid, dependency: Uuid },

    #[error("Task already registered: {0}")]
    DuplicateTask(Uuid),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Agent not found: {0}")]
    AgentNotFound(Uuid),

    #[error("Agent {0} is not bound to a task")]
    AgentNotBusy(Uuid),

    #[error("Assignment race: agent {agent} / task {task}: {detail}")]
    AssignmentRace {
        agent: Uuid,
        task: Uuid,
        detail: String,
    },

    #[error("Invalid state transition for task {task} from {from} to {to}")]
    InvalidStateTransition {
        task: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task {task} cannot be requeued while dependency {dependency} is {status}")]
    UnresolvedBlocker {
        task: Uuid,
        dependency: Uuid,
        status: TaskStatus,
    },

    #[error("Agent {agent} did not release task {task} within the expected window")]
    AgentTimeout { agent: Uuid, task: Uuid },

    #[error("SyncDegraded: {0}")]
    SyncDegraded(String),

    #[error("Sprint not found: {0}")]
    SprintNotFound(Uuid),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, OrchestrationError>;

impl From<sqlx::Error> for OrchestrationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for OrchestrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
