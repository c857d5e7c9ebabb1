//! Execution log and chain-of-thought records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Severity of an execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "success" => Some(Self::Success),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Success and error entries are mirrored to the issue tracker as comments.
    pub fn is_notable(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the append-only execution log.
///
/// `seq` is assigned by the log on append; entries built by callers carry 0
/// until then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Fleet-level entries (such as sync degradation) carry no task
    pub task_id: Option<Uuid>,
    /// Emitting component or agent name
    pub source: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            seq: 0,
            timestamp: Utc::now(),
            level,
            message: message.into(),
            task_id: None,
            source: None,
        }
    }

    pub fn with_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A single step of an agent's reasoning, attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainOfThoughtEntry {
    pub seq: u64,
    pub task_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub content: String,
    /// Milestones are also mirrored to the issue tracker
    pub milestone: bool,
    pub recorded_at: DateTime<Utc>,
}

impl ChainOfThoughtEntry {
    pub fn new(task_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            seq: 0,
            task_id,
            agent_id: None,
            content: content.into(),
            milestone: false,
            recorded_at: Utc::now(),
        }
    }

    pub fn by_agent(mut self, agent_id: Uuid) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn as_milestone(mut self) -> Self {
        self.milestone = true;
        self
    }
}
