//! Common test utilities for integration tests
//!
//! Provides shared fixtures for building orchestrators and fleets.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cadre::adapters::memory::InMemoryContextStore;
use cadre::application::{Orchestrator, OrchestratorSettings};
use cadre::domain::models::{Agent, Persona};
use cadre::domain::ports::ContextStore;
use cadre::services::SyncPolicy;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Orchestrator over a fresh in-memory cache.
pub fn orchestrator() -> Arc<Orchestrator> {
    orchestrator_with_store(Arc::new(InMemoryContextStore::new()))
}

pub fn orchestrator_with_store(store: Arc<dyn ContextStore>) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(store, OrchestratorSettings::default()))
}

/// Register agents and return their ids in the given order.
pub async fn add_agents(orch: &Orchestrator, agents: &[(&str, Persona)]) -> Vec<uuid::Uuid> {
    let mut ids = Vec::with_capacity(agents.len());
    for (name, persona) in agents {
        let agent = Agent::new(*name, *persona);
        ids.push(agent.id);
        orch.register_agent(agent).await.expect("register agent");
    }
    ids
}

/// Retry policy with millisecond backoff so outage tests finish quickly.
pub fn fast_sync_policy(max_attempts: u32) -> SyncPolicy {
    SyncPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        max_deferred: 64,
    }
}
