//! Cadre - orchestration core for persona-bound agent fleets
//!
//! Cadre schedules a dependency graph of tasks onto a fleet of agents, each
//! bound to one persona (architect, developer, QA, ...). It keeps an
//! append-only audit trail of what every agent did and thought, short-cuts
//! repeated work through a content-addressed context cache, and mirrors task
//! state to an external issue tracker.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the ports adapters implement
//! - **Service Layer** (`services`): scheduler, assignment, cache, log, sync, health
//! - **Application Layer** (`application`): the orchestrator and fleet runner
//! - **Adapters** (`adapters`): SQLite, GitHub Issues, in-memory, executors
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cadre::adapters::executors::DryRunExecutor;
//! use cadre::adapters::memory::InMemoryContextStore;
//! use cadre::application::{FleetRunner, Orchestrator, OrchestratorSettings};
//! use cadre::domain::models::{Agent, Persona, Task};
//!
//! # async fn example() -> Result<(), cadre::OrchestrationError> {
//! let orchestrator = Arc::new(Orchestrator::new(
//!     Arc::new(InMemoryContextStore::new()),
//!     OrchestratorSettings::default(),
//! ));
//! orchestrator.register_agent(Agent::new("dev-1", Persona::Developer)).await?;
//! orchestrator.register_task(Task::new("Add login", "", Persona::Developer)).await?;
//!
//! let summary = FleetRunner::new(orchestrator, Arc::new(DryRunExecutor::new()), Duration::from_millis(250))
//!     .run_until_idle()
//!     .await?;
//! assert_eq!(summary.completed, 1);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{FleetRunner, Orchestrator, OrchestratorSettings, RunSummary};
pub use domain::models::{
    Agent, AgentStatus, Config, Persona, Task, TaskOutcome, TaskStatus, WorkflowDefinition,
};
pub use domain::{DomainResult, OrchestrationError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{DependencyResolver, DependencyScheduler};
