pub mod agent;
pub mod config;
pub mod health;
pub mod log;
pub mod sprint;
pub mod task;
pub mod workflow;

pub use agent::{Agent, AgentStatus, Persona};
pub use config::{
    CacheConfig, Config, DatabaseConfig, FleetConfig, LogFormat, LoggingConfig, RotationPolicy,
    SchedulerConfig, SyncConfig, TrackerConfig,
};
pub use health::SystemHealth;
pub use log::{ChainOfThoughtEntry, LogEntry, LogLevel};
pub use sprint::{Sprint, SprintReport, SprintStatus};
pub use task::{
    Artifact, ArtifactKind, Blocker, BlockerReason, IssueRef, Task, TaskOutcome, TaskPriority,
    TaskStatus, TaskTransition,
};
pub use workflow::{WorkflowDefinition, WorkflowTaskSpec};
