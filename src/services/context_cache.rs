//! Idempotent context cache.
//!
//! Tasks are keyed by a fingerprint of their semantically relevant inputs.
//! A recorded outcome lets an identical task complete without running, and
//! the in-flight table makes sure only one task per fingerprint runs at a
//! time.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{Artifact, Task, TaskOutcome};
use crate::domain::ports::{CachedOutcome, ContextStore};

/// Hex SHA-256 digest of a task's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Fingerprint over title, description, persona and the ordered outputs of
/// the task's dependencies. Pure: equal inputs give equal fingerprints.
pub fn compute_fingerprint(task: &Task, dependency_outputs: &[&Artifact]) -> Fingerprint {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, task.title.as_bytes());
    update_field(&mut hasher, task.description.as_bytes());
    update_field(&mut hasher, task.persona.as_str().as_bytes());
    hasher.update((dependency_outputs.len() as u64).to_le_bytes());
    for artifact in dependency_outputs {
        update_field(&mut hasher, artifact.name.as_bytes());
        hasher.update(artifact.size_bytes.to_le_bytes());
    }
    Fingerprint(format!("{:x}", hasher.finalize()))
}

/// State broadcast to tasks waiting on an in-flight fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub enum FlightState {
    Running,
    Done(TaskOutcome),
    /// The leader failed, was cancelled or timed out; a waiter may lead next
    Abandoned,
}

/// Outcome of [`ContextCache::claim`].
#[derive(Debug)]
pub enum Claim {
    /// An outcome is already recorded
    Hit(TaskOutcome),
    /// Caller runs the task and must later `record` or `abandon`
    Leader,
    /// Another task with the same fingerprint is running
    Follower(watch::Receiver<FlightState>),
}

pub struct ContextCache {
    store: Arc<dyn ContextStore>,
    in_flight: Mutex<HashMap<Fingerprint, watch::Sender<FlightState>>>,
    enabled: bool,
}

impl ContextCache {
    pub fn new(store: Arc<dyn ContextStore>) -> Self {
        Self {
            store,
            in_flight: Mutex::new(HashMap::new()),
            enabled: true,
        }
    }

    /// A disabled cache never hits and never coordinates.
    pub fn disabled(store: Arc<dyn ContextStore>) -> Self {
        Self {
            enabled: false,
            ..Self::new(store)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn lookup(&self, fingerprint: &Fingerprint) -> DomainResult<Option<TaskOutcome>> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(self
            .store
            .get(fingerprint.as_str())
            .await?
            .map(|cached| cached.outcome))
    }

    /// Record an outcome (last write wins) and wake any waiters.
    pub async fn record(&self, fingerprint: &Fingerprint, outcome: TaskOutcome) -> DomainResult<()> {
        if !self.enabled {
            return Ok(());
        }
        let result = self
            .store
            .put(CachedOutcome {
                fingerprint: fingerprint.to_string(),
                outcome: outcome.clone(),
                recorded_at: Utc::now(),
            })
            .await;

        if let Some(tx) = self.in_flight.lock().await.remove(fingerprint) {
            let _ = tx.send(FlightState::Done(outcome));
        }
        debug!(fingerprint = %fingerprint, "outcome recorded");
        result
    }

    /// Decide whether the caller should run the task.
    pub async fn claim(&self, fingerprint: &Fingerprint) -> Claim {
        if !self.enabled {
            return Claim::Leader;
        }
        let mut in_flight = self.in_flight.lock().await;
        if let Some(tx) = in_flight.get(fingerprint) {
            return Claim::Follower(tx.subscribe());
        }
        match self.store.get(fingerprint.as_str()).await {
            Ok(Some(cached)) => return Claim::Hit(cached.outcome),
            Ok(None) => {}
            Err(err) => warn!(fingerprint = %fingerprint, error = %err, "context store lookup failed, treating as miss"),
        }
        let (tx, _rx) = watch::channel(FlightState::Running);
        in_flight.insert(fingerprint.clone(), tx);
        Claim::Leader
    }

    /// Release a leadership without an outcome.
    pub async fn abandon(&self, fingerprint: &Fingerprint) {
        if let Some(tx) = self.in_flight.lock().await.remove(fingerprint) {
            let _ = tx.send(FlightState::Abandoned);
        }
    }

    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

/// Wait for the leader of a fingerprint to finish. `None` means it gave up.
pub async fn wait_for_leader(mut rx: watch::Receiver<FlightState>) -> Option<TaskOutcome> {
    loop {
        match &*rx.borrow_and_update() {
            FlightState::Done(outcome) => return Some(outcome.clone()),
            FlightState::Abandoned => return None,
            FlightState::Running => {}
        }
        if rx.changed().await.is_err() {
            // Sender dropped without a verdict
            return match &*rx.borrow() {
                FlightState::Done(outcome) => Some(outcome.clone()),
                _ => None,
            };
        }
    }
}
