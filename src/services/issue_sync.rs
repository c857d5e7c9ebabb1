//! Issue synchronizer.
//!
//! Mirrors task state into the external issue tracker. The core only ever
//! enqueues events on an unbounded channel; a single background worker makes
//! the remote calls, so a slow or broken tracker never stalls scheduling.
//! Transient failures are retried with exponential backoff and, once the
//! attempts run out, the event is deferred and the fleet is flagged as
//! degraded until a later call succeeds.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::OrchestrationError;
use crate::domain::models::{IssueRef, LogLevel, SyncConfig, Task, TaskStatus};
use crate::domain::ports::{IssueLinkSink, IssueLinkStore, IssueState, IssueTracker, TrackerError};
use crate::services::execution_log::ExecutionLog;
use crate::services::health::LatencyWindow;

const SOURCE: &str = "issue_sync";

/// Something the tracker should learn about.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Snapshot of a task right after a status change
    Status(Box<Task>),
    /// Free-text comment for the task's issue
    Comment { task_id: Uuid, body: String },
}

impl SyncEvent {
    pub fn task_id(&self) -> Uuid {
        match self {
            Self::Status(task) => task.id,
            Self::Comment { task_id, .. } => *task_id,
        }
    }
}

enum Command {
    Event(SyncEvent),
    Flush(oneshot::Sender<()>),
}

/// Retry policy for remote calls.
#[derive(Debug, Clone)]
pub struct SyncPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_deferred: usize,
}

impl From<&SyncConfig> for SyncPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
            max_deferred: config.max_deferred.max(1),
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

/// Cheap, cloneable producer side of the synchronizer.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<Command>,
    degraded: Arc<AtomicBool>,
}

impl SyncHandle {
    /// Queue an event. Never blocks.
    pub fn enqueue(&self, event: SyncEvent) {
        if self.tx.send(Command::Event(event)).is_err() {
            warn!("issue sync worker has stopped; dropping event");
        }
    }

    /// Wait until every event queued so far (and every deferred one the
    /// tracker now accepts) has been processed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }
}

/// The transient failure budget ran out; try again later.
struct Deferred(TrackerError);

pub struct IssueSynchronizer {
    tracker: Arc<dyn IssueTracker>,
    links: Arc<dyn IssueLinkStore>,
    sink: Option<Arc<dyn IssueLinkSink>>,
    log: Arc<ExecutionLog>,
    latency: Arc<LatencyWindow>,
    degraded: Arc<AtomicBool>,
    policy: SyncPolicy,
    deferred: VecDeque<SyncEvent>,
}

impl IssueSynchronizer {
    pub fn new(
        tracker: Arc<dyn IssueTracker>,
        links: Arc<dyn IssueLinkStore>,
        log: Arc<ExecutionLog>,
        latency: Arc<LatencyWindow>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            tracker,
            links,
            sink: None,
            log,
            latency,
            degraded: Arc::new(AtomicBool::new(false)),
            policy,
            deferred: VecDeque::new(),
        }
    }

    /// Receive newly created issue links.
    pub fn with_sink(mut self, sink: Arc<dyn IssueLinkSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Start the worker on the current runtime.
    pub fn spawn(self) -> (SyncHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SyncHandle {
            tx,
            degraded: self.degraded.clone(),
        };
        let worker = tokio::spawn(self.run(rx));
        (handle, worker)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Event(event) => {
                    self.replay_deferred().await;
                    if self.deferred.is_empty() {
                        if let Err(Deferred(err)) = self.process(&event).await {
                            self.defer(event, &err).await;
                        }
                    } else {
                        // Keep order: nothing overtakes a deferred event
                        self.push_deferred(event);
                    }
                }
                Command::Flush(done) => {
                    self.replay_deferred().await;
                    let _ = done.send(());
                }
            }
        }
        debug!(pending = self.deferred.len(), "issue sync worker stopped");
    }

    async fn replay_deferred(&mut self) {
        while let Some(event) = self.deferred.pop_front() {
            if let Err(Deferred(err)) = self.process(&event).await {
                debug!(error = %err, pending = self.deferred.len() + 1, "tracker still unavailable");
                self.deferred.push_front(event);
                return;
            }
        }
    }

    fn push_deferred(&mut self, event: SyncEvent) {
        if self.deferred.len() >= self.policy.max_deferred {
            if let Some(dropped) = self.deferred.pop_front() {
                warn!(task_id = %dropped.task_id(), "deferred sync queue full, dropping oldest event");
            }
        }
        self.deferred.push_back(event);
    }

    async fn defer(&mut self, event: SyncEvent, err: &TrackerError) {
        let task_id = event.task_id();
        self.push_deferred(event);
        if !self.degraded.swap(true, Ordering::SeqCst) {
            let degraded = OrchestrationError::SyncDegraded(format!(
                "issue tracker unavailable after {} attempts ({err}); deferring updates starting with task {task_id}",
                self.policy.max_attempts
            ));
            self.log
                .log(LogLevel::Warning, degraded.to_string(), None, Some(SOURCE))
                .await;
        }
    }

    fn mark_healthy(&self) {
        if self.degraded.swap(false, Ordering::SeqCst) {
            info!("issue tracker reachable again, sync resumed");
        }
    }

    async fn process(&self, event: &SyncEvent) -> Result<(), Deferred> {
        let result = match event {
            SyncEvent::Status(task) => self.sync_status(task).await,
            SyncEvent::Comment { task_id, body } => self.sync_comment(*task_id, body).await,
        };
        match result {
            Ok(()) => {
                self.mark_healthy();
                Ok(())
            }
            Err(TrackerError::Permanent(reason)) => {
                // The tracker answered, so it is reachable
                self.mark_healthy();
                self.log
                    .log(
                        LogLevel::Warning,
                        format!("issue tracker rejected update, dropping it: {reason}"),
                        Some(event.task_id()),
                        Some(SOURCE),
                    )
                    .await;
                Ok(())
            }
            Err(err) => Err(Deferred(err)),
        }
    }

    async fn link_for(&self, task_id: Uuid) -> Result<Option<IssueRef>, TrackerError> {
        self.links
            .get(task_id)
            .await
            .map_err(|e| TrackerError::Transient(format!("issue link store: {e}")))
    }

    async fn sync_status(&self, task: &Task) -> Result<(), TrackerError> {
        let issue = match self.link_for(task.id).await? {
            Some(issue) => {
                // Linked by an earlier run: the task itself starts without it
                if task.issue_ref.is_none() {
                    if let Some(sink) = &self.sink {
                        sink.link_issue(task.id, issue.clone()).await;
                    }
                }
                issue
            }
            None if creates_issue(task.status) => self.create_issue(task).await?,
            None => {
                debug!(task_id = %task.id, status = %task.status, "no issue yet, skipping");
                return Ok(());
            }
        };

        let state = if closes_issue(task.status) {
            IssueState::Closed
        } else {
            IssueState::Open
        };
        if state == IssueState::Closed {
            let current = self
                .call("get_issue", || self.tracker.get_issue(&issue.external_id))
                .await?;
            if current == IssueState::Closed {
                debug!(task_id = %task.id, issue = %issue.external_id, "issue already closed");
                return Ok(());
            }
        }

        let labels = labels_for(task);
        self.call("update_issue", || {
            self.tracker.update_issue(&issue.external_id, state, &labels)
        })
        .await
    }

    async fn create_issue(&self, task: &Task) -> Result<IssueRef, TrackerError> {
        let body = issue_body(task);
        let issue = self
            .call("create_issue", || self.tracker.create_issue(&task.title, &body))
            .await?;
        self.links
            .put(task.id, &issue)
            .await
            .map_err(|e| TrackerError::Transient(format!("issue link store: {e}")))?;
        if let Some(sink) = &self.sink {
            sink.link_issue(task.id, issue.clone()).await;
        }
        info!(task_id = %task.id, issue = %issue.external_id, "issue created");
        Ok(issue)
    }

    async fn sync_comment(&self, task_id: Uuid, body: &str) -> Result<(), TrackerError> {
        let Some(issue) = self.link_for(task_id).await? else {
            debug!(task_id = %task_id, "comment for unlinked task dropped");
            return Ok(());
        };
        self.call("add_comment", || self.tracker.add_comment(&issue.external_id, body))
            .await
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.policy.initial_backoff)
            .with_max_interval(self.policy.max_backoff)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Run one remote call with bounded retries. Every attempt's duration
    /// feeds the latency window.
    async fn call<T, F, Fut>(&self, op: &str, mut f: F) -> Result<T, TrackerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TrackerError>>,
    {
        let mut schedule = self.backoff();
        let mut attempt = 1;
        loop {
            let started = Instant::now();
            let result = f().await;
            self.latency.record(started.elapsed());

            match result {
                Ok(value) => return Ok(value),
                Err(err @ TrackerError::Permanent(_)) => return Err(err),
                Err(err) if attempt >= self.policy.max_attempts => {
                    warn!(op, attempt, error = %err, "tracker call failed, giving up");
                    return Err(err);
                }
                Err(err) => {
                    let delay = schedule.next_backoff().unwrap_or(self.policy.max_backoff);
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    debug!(op, attempt, delay_ms, error = %err, "retrying tracker call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn creates_issue(status: TaskStatus) -> bool {
    matches!(
        status,
        TaskStatus::Ready | TaskStatus::InProgress | TaskStatus::Completed | TaskStatus::Failed
    )
}

fn closes_issue(status: TaskStatus) -> bool {
    matches!(status, TaskStatus::Completed | TaskStatus::Cancelled)
}

pub fn labels_for(task: &Task) -> Vec<String> {
    vec![
        format!("status:{}", task.status.as_str()),
        format!("persona:{}", task.persona.as_str()),
        format!("priority:{}", task.priority.as_str()),
    ]
}

fn issue_body(task: &Task) -> String {
    let mut body = String::new();
    if !task.description.is_empty() {
        body.push_str(&task.description);
        body.push_str("\n\n");
    }
    body.push_str(&format!(
        "---\ncadre task `{}` (workflow `{}`, persona `{}`)",
        task.id, task.workflow_id, task.persona
    ));
    body
}
