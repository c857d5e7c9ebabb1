//! Fleet runner.
//!
//! Drives the orchestrator: dispatch ready work, execute each dispatch on
//! its own tokio task, apply outcomes as they arrive and reclaim agents that
//! overrun the timeout window. Runs until nothing is executing and nothing
//! more can be dispatched, or until shutdown is signalled.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::orchestrator::{Dispatch, Orchestrator};
use crate::domain::errors::DomainResult;
use crate::domain::models::{TaskOutcome, TaskStatus};
use crate::domain::ports::{AgentExecutor, ExecutionContext};

/// Counts reported when a run ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dispatched: usize,
    pub timed_out: usize,
    pub completed: usize,
    pub failed: usize,
    pub blocked: usize,
    pub cancelled: usize,
    /// Pending or ready tasks nobody could pick up
    pub stranded: usize,
    pub elapsed_ms: u64,
}

pub struct FleetRunner {
    orchestrator: Arc<Orchestrator>,
    executor: Arc<dyn AgentExecutor>,
    poll_interval: Duration,
    shutdown: Option<watch::Receiver<bool>>,
}

impl FleetRunner {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        executor: Arc<dyn AgentExecutor>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            executor,
            poll_interval,
            shutdown: None,
        }
    }

    /// Stop dispatching when the receiver flips to `true`. Running tasks are
    /// cancelled and drained.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub async fn run_until_idle(&self) -> DomainResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut running: JoinSet<(Uuid, Uuid, TaskOutcome)> = JoinSet::new();
        let mut shutdown = self.shutdown.clone();

        info!("fleet run started");
        loop {
            if shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
                self.cancel_running().await;
                break;
            }

            for dispatch in self.orchestrator.dispatch().await? {
                summary.dispatched += 1;
                self.spawn(&mut running, dispatch);
            }

            if running.is_empty() {
                debug!("nothing running and nothing dispatchable");
                break;
            }

            tokio::select! {
                Some(joined) = running.join_next() => {
                    match joined {
                        Ok((agent_id, task_id, outcome)) => {
                            self.orchestrator.complete(agent_id, task_id, outcome).await?;
                        }
                        Err(err) => error!(error = %err, "agent worker join failed"),
                    }
                }
                () = tokio::time::sleep(self.poll_interval) => {
                    summary.timed_out += self.orchestrator.reap_timed_out().await?.len();
                }
                () = wait_for_shutdown(&mut shutdown) => {
                    info!("shutdown requested");
                }
            }
        }

        while let Some(joined) = running.join_next().await {
            if let Ok((agent_id, task_id, outcome)) = joined {
                self.orchestrator.complete(agent_id, task_id, outcome).await?;
            }
        }
        self.orchestrator.flush_sync().await;

        for task in self.orchestrator.tasks().await {
            match task.status {
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Blocked => summary.blocked += 1,
                TaskStatus::Cancelled => summary.cancelled += 1,
                TaskStatus::Pending | TaskStatus::Ready => summary.stranded += 1,
                TaskStatus::InProgress => {}
            }
        }
        summary.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            dispatched = summary.dispatched,
            completed = summary.completed,
            failed = summary.failed,
            blocked = summary.blocked,
            stranded = summary.stranded,
            elapsed_ms = summary.elapsed_ms,
            "fleet run finished"
        );
        Ok(summary)
    }

    fn spawn(&self, running: &mut JoinSet<(Uuid, Uuid, TaskOutcome)>, dispatch: Dispatch) {
        let executor = Arc::clone(&self.executor);
        let journal = self.orchestrator.journal(&dispatch);
        let agent_id = dispatch.agent.id;
        let task_id = dispatch.task.id;
        info!(agent = %dispatch.agent.name, task_id = %task_id, "spawning agent worker");

        let ctx = ExecutionContext {
            agent: dispatch.agent,
            task: dispatch.task,
            journal,
            cancel: dispatch.cancel,
        };
        running.spawn(async move {
            // Inner task so a panicking executor still yields an outcome
            let outcome = match tokio::spawn(async move { executor.execute(ctx).await }).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(task_id = %task_id, error = %err, "agent executor crashed");
                    TaskOutcome::failure(format!("agent crashed: {err}"))
                }
            };
            (agent_id, task_id, outcome)
        });
    }

    async fn cancel_running(&self) {
        for (_, task_id) in self.orchestrator.bindings().await {
            if let Err(err) = self.orchestrator.cancel(task_id).await {
                warn!(task_id = %task_id, error = %err, "could not cancel task on shutdown");
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut Option<watch::Receiver<bool>>) {
    match shutdown {
        Some(rx) => {
            if rx.changed().await.is_err() {
                // Sender dropped; no shutdown will ever come
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}
