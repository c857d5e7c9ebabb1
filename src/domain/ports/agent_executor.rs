//! Agent execution port.
//!
//! An agent's reasoning is opaque to the core: an executor receives the task,
//! reports progress through the journal, and returns a terminal outcome.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use crate::domain::models::{Agent, LogLevel, Task, TaskOutcome};

/// Progress channel handed to an executing agent.
#[async_trait]
pub trait AgentJournal: Send + Sync {
    /// Record a chain-of-thought step. Milestones are mirrored to the issue.
    async fn think(&self, content: &str, milestone: bool);

    async fn log(&self, level: LogLevel, message: &str);

    /// Update the agent's last-action field.
    async fn report_action(&self, action: &str);
}

/// Everything an executor needs for one run.
pub struct ExecutionContext {
    pub agent: Agent,
    pub task: Task,
    pub journal: Arc<dyn AgentJournal>,
    /// Flips to `true` when an operator cancels the task
    pub cancel: watch::Receiver<bool>,
}

impl ExecutionContext {
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, ctx: ExecutionContext) -> TaskOutcome;
}
