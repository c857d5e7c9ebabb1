//! Task domain model.
//!
//! Tasks are discrete units of work that persona-bound agents execute.
//! They form a DAG with dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::agent::Persona;

/// Status of a task in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is defined but dependencies not met
    Pending,
    /// Task is ready to be picked up (dependencies met)
    Ready,
    /// Task is bound to an agent
    InProgress,
    /// Task completed successfully
    Completed,
    /// Task failed during execution
    Failed,
    /// Task is held because an ancestor failed, was cancelled, or its agent timed out
    Blocked,
    /// Task was cancelled by an operator
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "in_progress" | "running" => Some(Self::InProgress),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal success: the only state that satisfies a dependency.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// No further automatic transition happens from a terminal state.
    /// `Blocked` counts because it only leaves through an operator requeue.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Blocked
        )
    }

    /// Check if this is an active (non-terminal) state.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Ready, Self::Blocked, Self::Cancelled],
            Self::Ready => &[
                Self::InProgress,
                Self::Completed,
                Self::Blocked,
                Self::Cancelled,
                Self::Pending,
            ],
            Self::InProgress => &[
                Self::Completed,
                Self::Failed,
                Self::Blocked,
                Self::Cancelled,
            ],
            Self::Blocked => &[Self::Ready, Self::Pending, Self::Cancelled],
            Self::Failed => &[Self::Ready, Self::Pending],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority level for tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Type of artifact produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    File,
    Document,
    Report,
    Code,
}

/// Output produced by a task. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Name or relative path
    pub name: String,
    pub kind: ArtifactKind,
    pub size_bytes: u64,
    /// Line count for text artifacts
    pub line_count: Option<u64>,
    pub produced_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, kind: ArtifactKind, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            size_bytes,
            line_count: None,
            produced_at: Utc::now(),
        }
    }

    pub fn with_line_count(mut self, lines: u64) -> Self {
        self.line_count = Some(lines);
        self
    }
}

/// Why a task cannot proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockerReason {
    DependencyFailed { task_id: Uuid },
    DependencyCancelled { task_id: Uuid },
    AgentTimeout { agent_id: Uuid },
    Manual { note: String },
}

/// Human-readable record explaining why a task is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
    pub reason: BlockerReason,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

impl Blocker {
    pub fn dependency_failed(task_id: Uuid) -> Self {
        Self {
            reason: BlockerReason::DependencyFailed { task_id },
            description: format!("dependency {task_id} failed"),
            recorded_at: Utc::now(),
        }
    }

    pub fn dependency_cancelled(task_id: Uuid) -> Self {
        Self {
            reason: BlockerReason::DependencyCancelled { task_id },
            description: format!("dependency {task_id} was cancelled"),
            recorded_at: Utc::now(),
        }
    }

    pub fn agent_timeout(agent_id: Uuid, window_secs: u64) -> Self {
        Self {
            reason: BlockerReason::AgentTimeout { agent_id },
            description: format!("agent {agent_id} did not release the task within {window_secs}s"),
            recorded_at: Utc::now(),
        }
    }

    pub fn manual(note: impl Into<String>) -> Self {
        let note = note.into();
        Self {
            description: note.clone(),
            reason: BlockerReason::Manual { note },
            recorded_at: Utc::now(),
        }
    }

    /// The upstream task this blocker points at, if any.
    pub fn blocking_task(&self) -> Option<Uuid> {
        match self.reason {
            BlockerReason::DependencyFailed { task_id }
            | BlockerReason::DependencyCancelled { task_id } => Some(task_id),
            _ => None,
        }
    }
}

/// Reference to the mirrored issue in the external tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub external_id: String,
    pub url: Option<String>,
    pub linked_at: DateTime<Utc>,
}

impl IssueRef {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            url: None,
            linked_at: Utc::now(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Terminal result reported by an agent (or replayed from the context cache).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success { artifacts: Vec<Artifact> },
    Failure { reason: String },
}

impl TaskOutcome {
    pub fn success(artifacts: Vec<Artifact>) -> Self {
        Self::Success { artifacts }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A single status change, returned by every scheduler mutation so callers
/// can log it and mirror it outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTransition {
    pub task_id: Uuid,
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub at: DateTime<Utc>,
}

/// A discrete unit of work that can be executed by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: Uuid,
    /// Human-readable title
    pub title: String,
    /// Detailed description
    pub description: String,
    /// Current status
    pub status: TaskStatus,
    /// Capability required to execute this task
    pub persona: Persona,
    /// Priority
    pub priority: TaskPriority,
    /// Agent currently bound to this task
    pub assigned_agent: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the current (or last) execution started
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Accumulated execution time across all runs
    pub elapsed_ms: u64,
    /// Task IDs this depends on
    pub depends_on: Vec<Uuid>,
    /// Produced artifacts
    pub artifacts: Vec<Artifact>,
    pub blockers: Vec<Blocker>,
    /// Owning workflow
    pub workflow_id: Uuid,
    pub sprint_id: Option<Uuid>,
    /// Mirrored issue in the external tracker
    pub issue_ref: Option<IssueRef>,
    pub archived: bool,
    /// Set when an operator cancels an in-progress task; honoured at release
    pub cancel_requested: bool,
}

impl Task {
    /// Create a new task with an explicit title and description.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        persona: Persona,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            status: TaskStatus::default(),
            persona,
            priority: TaskPriority::default(),
            assigned_agent: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            elapsed_ms: 0,
            depends_on: Vec::new(),
            artifacts: Vec::new(),
            blockers: Vec::new(),
            workflow_id: Uuid::nil(),
            sprint_id: None,
            issue_ref: None,
            archived: false,
            cancel_requested: false,
        }
    }

    /// Use a caller-chosen id (workflow definitions derive stable ids).
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Add a dependency. Duplicates and self-edges are ignored.
    pub fn with_dependency(mut self, task_id: Uuid) -> Self {
        if !self.depends_on.contains(&task_id) && task_id != self.id {
            self.depends_on.push(task_id);
        }
        self
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_workflow(mut self, workflow_id: Uuid) -> Self {
        self.workflow_id = workflow_id;
        self
    }

    pub fn with_sprint(mut self, sprint_id: Uuid) -> Self {
        self.sprint_id = Some(sprint_id);
        self
    }

    /// Check if can transition to given status.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to new status, stamping timestamps.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), String> {
        if !self.can_transition_to(new_status) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status.as_str(),
                new_status.as_str()
            ));
        }

        let now = Utc::now();
        self.status = new_status;
        self.updated_at = now;

        match new_status {
            TaskStatus::InProgress => {
                self.started_at = Some(now);
                self.completed_at = None;
            }
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => {
                self.completed_at = Some(now);
            }
            _ => {}
        }

        Ok(())
    }

    /// Check if task is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Validate task.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Task title cannot be empty".to_string());
        }
        if self.depends_on.contains(&self.id) {
            return Err("Task cannot depend on itself".to_string());
        }
        Ok(())
    }
}
