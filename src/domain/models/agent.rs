use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Capability an agent is bound to. A task can only run on an agent with the
/// same persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    ProductManager,
    Architect,
    Developer,
    Qa,
    Devops,
    TechWriter,
}

impl Persona {
    pub const ALL: [Self; 6] = [
        Self::ProductManager,
        Self::Architect,
        Self::Developer,
        Self::Qa,
        Self::Devops,
        Self::TechWriter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductManager => "product_manager",
            Self::Architect => "architect",
            Self::Developer => "developer",
            Self::Qa => "qa",
            Self::Devops => "devops",
            Self::TechWriter => "tech_writer",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "product_manager" | "pm" => Ok(Self::ProductManager),
            "architect" => Ok(Self::Architect),
            "developer" | "dev" => Ok(Self::Developer),
            "qa" => Ok(Self::Qa),
            "devops" => Ok(Self::Devops),
            "tech_writer" => Ok(Self::TechWriter),
            _ => Err(anyhow::anyhow!("Invalid persona: {s}")),
        }
    }
}

/// Agent status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
    Offline,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Busy => write!(f, "busy"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for AgentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "busy" => Ok(Self::Busy),
            "offline" => Ok(Self::Offline),
            _ => Err(anyhow::anyhow!("Invalid agent status: {s}")),
        }
    }
}

/// Agent entity representing one member of the fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique agent identifier
    pub id: Uuid,

    /// Display name (e.g. "developer-2")
    pub name: String,

    /// Persona this agent is bound to
    pub persona: Persona,

    /// Current agent status
    pub status: AgentStatus,

    /// ID of the currently executing task (if any)
    pub current_task: Option<Uuid>,

    /// Accumulated time spent bound to tasks
    pub active_ms: u64,

    /// Last action the agent reported, free text
    pub last_action: Option<String>,

    pub last_action_at: Option<DateTime<Utc>>,

    /// When the current binding started
    pub bound_at: Option<DateTime<Utc>>,

    /// Agent creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Create a new idle agent
    pub fn new(name: impl Into<String>, persona: Persona) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            persona,
            status: AgentStatus::Idle,
            current_task: None,
            active_ms: 0,
            last_action: None,
            last_action_at: None,
            bound_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle && self.current_task.is_none()
    }

    /// Check if the current binding has exceeded `window`
    pub fn is_overdue(&self, window: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.bound_at.is_some_and(|bound| now - bound > window)
    }

    /// Record a free-text action
    pub fn record_action(&mut self, action: impl Into<String>) {
        self.last_action = Some(action.into());
        self.last_action_at = Some(Utc::now());
    }
}
