//! Orchestration context.
//!
//! `Orchestrator` owns the fleet state behind a single `tokio::sync::Mutex`.
//! Dispatching, releasing, cancelling, requeueing and reaping all go through
//! that lock, so dependency readiness and agent binding are observed
//! atomically. Agent execution happens outside the lock.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{
    Agent, ChainOfThoughtEntry, Config, IssueRef, LogEntry, LogLevel, Sprint, SprintReport,
    SprintStatus, SystemHealth, Task, TaskOutcome, TaskStatus, TaskTransition,
    WorkflowDefinition,
};
use crate::domain::ports::{
    AgentJournal, ContextStore, IssueLinkSink, IssueLinkStore, IssueTracker,
};
use crate::services::{
    compute_fingerprint, AssignmentManager, Claim, ContextCache, DependencyScheduler,
    ExecutionLog, Fingerprint, HealthAggregator, IssueSynchronizer, LatencyWindow, Release,
    SyncEvent, SyncHandle, SyncPolicy,
};

const SCHEDULER: &str = "scheduler";

/// Everything guarded by the fleet lock.
#[derive(Default)]
pub struct FleetState {
    pub scheduler: DependencyScheduler,
    pub assignments: AssignmentManager,
    pub sprints: HashMap<Uuid, Sprint>,
    /// Ready tasks waiting on another task with the same fingerprint
    parked: HashMap<Uuid, Fingerprint>,
    /// Fingerprints held by leader tasks
    claims: HashMap<Uuid, Fingerprint>,
    /// Cancel signal for each running task
    cancels: HashMap<Uuid, watch::Sender<bool>>,
}

impl FleetState {
    /// Forget a task's claim and let its followers compete again.
    fn drop_claim(&mut self, task_id: Uuid) -> Option<Fingerprint> {
        let fingerprint = self.claims.remove(&task_id)?;
        self.parked.retain(|_, fp| *fp != fingerprint);
        Some(fingerprint)
    }

    fn followers_of(&self, fingerprint: &Fingerprint) -> Vec<Uuid> {
        let mut followers: Vec<Uuid> = self
            .parked
            .iter()
            .filter(|(_, fp)| *fp == fingerprint)
            .map(|(id, _)| *id)
            .collect();
        followers.sort_by_key(|id| self.scheduler.task(*id).map(|t| t.created_at));
        followers
    }
}

/// A task handed to an agent.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub agent: Agent,
    pub task: Task,
    pub cancel: watch::Receiver<bool>,
}

/// Tunables taken from [`Config`].
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub agent_timeout: chrono::Duration,
    pub cache_enabled: bool,
    pub latency_window: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            agent_timeout: chrono::Duration::seconds(
                i64::try_from(config.scheduler.agent_timeout_secs).unwrap_or(i64::MAX / 1000),
            ),
            cache_enabled: config.cache.enabled,
            latency_window: config.sync.latency_window,
        }
    }
}

pub struct Orchestrator {
    state: Arc<Mutex<FleetState>>,
    cache: ContextCache,
    log: Arc<ExecutionLog>,
    sync: Option<SyncHandle>,
    latency: Arc<LatencyWindow>,
    health: HealthAggregator,
    agent_timeout: chrono::Duration,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ContextStore>, settings: OrchestratorSettings) -> Self {
        let cache = if settings.cache_enabled {
            ContextCache::new(store)
        } else {
            ContextCache::disabled(store)
        };
        Self {
            state: Arc::new(Mutex::new(FleetState::default())),
            cache,
            log: Arc::new(ExecutionLog::new()),
            sync: None,
            latency: Arc::new(LatencyWindow::new(settings.latency_window)),
            health: HealthAggregator::new(),
            agent_timeout: settings.agent_timeout,
        }
    }

    /// Use a shared (possibly archived) execution log.
    pub fn with_log(mut self, log: Arc<ExecutionLog>) -> Self {
        self.log = log;
        self
    }

    /// Start the issue synchronizer. Must be called inside a tokio runtime.
    pub fn with_issue_sync(
        mut self,
        tracker: Arc<dyn IssueTracker>,
        links: Arc<dyn IssueLinkStore>,
        policy: SyncPolicy,
    ) -> Self {
        let sink = Arc::new(FleetLinkWriter {
            state: self.state.clone(),
        });
        let (handle, _worker) = IssueSynchronizer::new(
            tracker,
            links,
            self.log.clone(),
            self.latency.clone(),
            policy,
        )
        .with_sink(sink)
        .spawn();
        self.sync = Some(handle);
        self
    }

    pub fn log(&self) -> &Arc<ExecutionLog> {
        &self.log
    }

    /// Wait for queued issue updates to be processed.
    pub async fn flush_sync(&self) {
        if let Some(sync) = &self.sync {
            sync.flush().await;
        }
    }

    pub fn sync_degraded(&self) -> bool {
        self.sync.as_ref().is_some_and(SyncHandle::is_degraded)
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    pub async fn register_agent(&self, agent: Agent) -> DomainResult<()> {
        self.state.lock().await.assignments.register_agent(agent)
    }

    pub async fn register_task(&self, task: Task) -> DomainResult<Vec<TaskTransition>> {
        self.register_tasks(vec![task]).await
    }

    /// Register tasks atomically and mirror the resulting transitions.
    pub async fn register_tasks(&self, tasks: Vec<Task>) -> DomainResult<Vec<TaskTransition>> {
        let mut fleet = self.state.lock().await;
        let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
        let transitions = fleet.scheduler.register_batch(tasks)?;
        for id in ids {
            self.log
                .log(LogLevel::Info, "task registered", Some(id), Some(SCHEDULER))
                .await;
        }
        self.mirror(&fleet, &transitions).await;
        Ok(transitions)
    }

    /// Register every task of a workflow definition, creating its sprint
    /// when one is named.
    #[instrument(skip(self, definition), fields(workflow = %definition.name))]
    pub async fn register_workflow(&self, definition: &WorkflowDefinition) -> DomainResult<Vec<Uuid>> {
        let mut tasks = definition.to_tasks()?;
        if let Some(name) = &definition.sprint {
            let sprint_id = self.ensure_sprint(name).await;
            for task in &mut tasks {
                task.sprint_id = Some(sprint_id);
            }
        }
        let ids = tasks.iter().map(|t| t.id).collect();
        self.register_tasks(tasks).await?;
        info!(workflow_id = %definition.id(), "workflow registered");
        Ok(ids)
    }

    pub async fn add_dependency(
        &self,
        task_id: Uuid,
        dependency: Uuid,
    ) -> DomainResult<Vec<TaskTransition>> {
        let mut guard = self.state.lock().await;
        let fleet = &mut *guard;
        let transitions = fleet.scheduler.add_dependency(task_id, dependency)?;
        // New inputs, new fingerprint
        self.leave_single_flight(fleet, task_id).await;
        self.mirror(fleet, &transitions).await;
        Ok(transitions)
    }

    // ------------------------------------------------------------------
    // Dispatch and release
    // ------------------------------------------------------------------

    /// Resolve cache hits, coordinate shared fingerprints and bind ready
    /// tasks to idle agents.
    #[instrument(skip(self))]
    pub async fn dispatch(&self) -> DomainResult<Vec<Dispatch>> {
        let mut guard = self.state.lock().await;
        let fleet = &mut *guard;
        let mut transitions = Vec::new();

        loop {
            let candidates: Vec<Uuid> = fleet
                .scheduler
                .ready_tasks()
                .map(|t| t.id)
                .filter(|id| !fleet.parked.contains_key(id) && !fleet.claims.contains_key(id))
                .collect();
            let mut progressed = false;

            for task_id in candidates {
                let fingerprint = {
                    let task = fleet.scheduler.get(task_id)?;
                    let outputs = fleet.scheduler.dependency_outputs(task_id)?;
                    compute_fingerprint(task, &outputs)
                };
                match self.cache.claim(&fingerprint).await {
                    Claim::Hit(outcome) if outcome.is_success() => {
                        transitions.extend(fleet.scheduler.complete_from_cache(task_id, &outcome)?);
                        self.log
                            .log(
                                LogLevel::Success,
                                format!("completed from context cache ({fingerprint})"),
                                Some(task_id),
                                Some(SCHEDULER),
                            )
                            .await;
                        progressed = true;
                    }
                    Claim::Hit(_) => {
                        warn!(task_id = %task_id, "cached outcome is not a success, running task");
                    }
                    Claim::Leader => {
                        fleet.claims.insert(task_id, fingerprint);
                    }
                    Claim::Follower(_) => {
                        debug!(task_id = %task_id, fingerprint = %fingerprint, "parked behind in-flight task");
                        fleet.parked.insert(task_id, fingerprint);
                    }
                }
            }
            // Cache completions can make dependents ready
            if !progressed {
                break;
            }
        }

        let excluded: HashSet<Uuid> = fleet.parked.keys().copied().collect();
        let assignments = fleet.assignments.assign(&mut fleet.scheduler, &excluded)?;

        let mut dispatches = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            transitions.extend(assignment.transitions);
            let (tx, rx) = watch::channel(false);
            fleet.cancels.insert(assignment.task_id, tx);
            let agent = fleet.assignments.agent(assignment.agent_id)?.clone();
            let task = fleet.scheduler.get(assignment.task_id)?.clone();
            self.log
                .log(
                    LogLevel::Info,
                    format!("assigned to {}", agent.name),
                    Some(task.id),
                    Some(SCHEDULER),
                )
                .await;
            dispatches.push(Dispatch {
                agent,
                task,
                cancel: rx,
            });
        }

        self.mirror(fleet, &transitions).await;
        Ok(dispatches)
    }

    /// Apply an agent's outcome for a dispatch. Returns `None` when the agent
    /// no longer holds the task (it was reclaimed after a timeout).
    #[instrument(skip(self, outcome))]
    pub async fn complete(
        &self,
        agent_id: Uuid,
        task_id: Uuid,
        outcome: TaskOutcome,
    ) -> DomainResult<Option<Release>> {
        let mut guard = self.state.lock().await;
        let fleet = &mut *guard;

        let Some(release) =
            fleet
                .assignments
                .release_if_bound(agent_id, task_id, &outcome, &mut fleet.scheduler)?
        else {
            self.log
                .log(
                    LogLevel::Warning,
                    "late release ignored: agent no longer holds this task",
                    Some(task_id),
                    Some(SCHEDULER),
                )
                .await;
            return Ok(None);
        };

        fleet.cancels.remove(&task_id);
        let mut transitions = release.transitions.clone();

        if !release.cancelled && outcome.is_success() {
            if let Some(fingerprint) = fleet.claims.remove(&task_id) {
                if let Err(err) = self.cache.record(&fingerprint, outcome.clone()).await {
                    warn!(task_id = %task_id, error = %err, "failed to persist cached outcome");
                }
                for follower in fleet.followers_of(&fingerprint) {
                    fleet.parked.remove(&follower);
                    if fleet.scheduler.task(follower).map(|t| t.status) != Some(TaskStatus::Ready) {
                        debug!(task_id = %follower, "follower no longer ready, left to the scheduler");
                        continue;
                    }
                    match fleet.scheduler.complete_from_cache(follower, &outcome) {
                        Ok(done) => {
                            transitions.extend(done);
                            self.log
                                .log(
                                    LogLevel::Success,
                                    format!("completed from outcome of task {task_id}"),
                                    Some(follower),
                                    Some(SCHEDULER),
                                )
                                .await;
                        }
                        Err(err) => {
                            warn!(task_id = %follower, error = %err, "could not complete follower from leader outcome");
                        }
                    }
                }
            }
        } else if let Some(fingerprint) = fleet.drop_claim(task_id) {
            self.cache.abandon(&fingerprint).await;
        }

        let (level, message) = match (&outcome, release.cancelled) {
            (_, true) => (LogLevel::Warning, "cancelled".to_string()),
            (TaskOutcome::Success { artifacts }, false) => (
                LogLevel::Success,
                format!("completed with {} artifact(s)", artifacts.len()),
            ),
            (TaskOutcome::Failure { reason }, false) => {
                (LogLevel::Error, format!("failed: {reason}"))
            }
        };
        let source = fleet.assignments.agent(agent_id)?.name.clone();
        self.append_and_comment(LogEntry::new(level, message).with_task(task_id).with_source(source))
            .await;

        self.mirror(fleet, &transitions).await;
        Ok(Some(release))
    }

    /// Release whatever task the agent currently holds.
    pub async fn release(&self, agent_id: Uuid, outcome: TaskOutcome) -> DomainResult<Release> {
        let task_id = {
            let fleet = self.state.lock().await;
            fleet
                .assignments
                .agent(agent_id)?
                .current_task
                .ok_or(OrchestrationError::AgentNotBusy(agent_id))?
        };
        self.complete(agent_id, task_id, outcome)
            .await?
            .ok_or(OrchestrationError::AgentNotBusy(agent_id))
    }

    // ------------------------------------------------------------------
    // Operator actions
    // ------------------------------------------------------------------

    /// Cancel a task. A running task is signalled and ends as cancelled
    /// when its agent releases it.
    #[instrument(skip(self))]
    pub async fn cancel(&self, task_id: Uuid) -> DomainResult<Vec<TaskTransition>> {
        let mut guard = self.state.lock().await;
        let fleet = &mut *guard;
        let transitions = fleet.scheduler.cancel(task_id)?;

        if let Some(signal) = fleet.cancels.get(&task_id) {
            let _ = signal.send(true);
            self.log
                .log(LogLevel::Warning, "cancel requested", Some(task_id), Some(SCHEDULER))
                .await;
        } else {
            self.leave_single_flight(fleet, task_id).await;
            self.log
                .log(LogLevel::Warning, "cancelled by operator", Some(task_id), Some(SCHEDULER))
                .await;
        }
        self.mirror(fleet, &transitions).await;
        Ok(transitions)
    }

    pub async fn requeue(&self, task_id: Uuid) -> DomainResult<Vec<TaskTransition>> {
        let mut guard = self.state.lock().await;
        let fleet = &mut *guard;
        let transitions = fleet.scheduler.requeue(task_id)?;
        self.leave_single_flight(fleet, task_id).await;
        self.log
            .log(LogLevel::Info, "requeued by operator", Some(task_id), Some(SCHEDULER))
            .await;
        self.mirror(fleet, &transitions).await;
        Ok(transitions)
    }

    /// Put a waiting task on hold until an operator requeues it.
    #[instrument(skip(self, note))]
    pub async fn hold(&self, task_id: Uuid, note: &str) -> DomainResult<Vec<TaskTransition>> {
        let mut guard = self.state.lock().await;
        let fleet = &mut *guard;
        let transitions = fleet.scheduler.hold(task_id, note)?;
        self.leave_single_flight(fleet, task_id).await;
        self.log
            .log(
                LogLevel::Warning,
                format!("held by operator: {note}"),
                Some(task_id),
                Some(SCHEDULER),
            )
            .await;
        self.mirror(fleet, &transitions).await;
        Ok(transitions)
    }

    /// Drop a task from its single-flight group. A leader's claim is
    /// abandoned so parked followers compete again.
    async fn leave_single_flight(&self, fleet: &mut FleetState, task_id: Uuid) {
        fleet.parked.remove(&task_id);
        if let Some(fingerprint) = fleet.drop_claim(task_id) {
            self.cache.abandon(&fingerprint).await;
        }
    }

    pub async fn archive(&self, task_id: Uuid) -> DomainResult<()> {
        self.state.lock().await.scheduler.archive(task_id)
    }

    /// Reclaim agents that held a task longer than the configured window.
    #[instrument(skip(self))]
    pub async fn reap_timed_out(&self) -> DomainResult<Vec<Release>> {
        self.reap_timed_out_at(Utc::now()).await
    }

    pub async fn reap_timed_out_at(&self, now: chrono::DateTime<Utc>) -> DomainResult<Vec<Release>> {
        let mut guard = self.state.lock().await;
        let fleet = &mut *guard;
        let reaped = fleet
            .assignments
            .reap_timed_out(self.agent_timeout, now, &mut fleet.scheduler)?;

        let mut transitions = Vec::new();
        for release in &reaped {
            if let Some(signal) = fleet.cancels.remove(&release.task_id) {
                let _ = signal.send(true);
            }
            if let Some(fingerprint) = fleet.drop_claim(release.task_id) {
                self.cache.abandon(&fingerprint).await;
            }
            let err = OrchestrationError::AgentTimeout {
                agent: release.agent_id,
                task: release.task_id,
            };
            self.append_and_comment(
                LogEntry::new(LogLevel::Error, err.to_string())
                    .with_task(release.task_id)
                    .with_source(SCHEDULER),
            )
            .await;
            transitions.extend(release.transitions.iter().cloned());
        }
        self.mirror(fleet, &transitions).await;
        Ok(reaped)
    }

    pub async fn set_agent_offline(&self, agent_id: Uuid) -> DomainResult<()> {
        self.state.lock().await.assignments.set_offline(agent_id)
    }

    pub async fn set_agent_online(&self, agent_id: Uuid) -> DomainResult<()> {
        self.state.lock().await.assignments.set_online(agent_id)
    }

    // ------------------------------------------------------------------
    // Agent reporting
    // ------------------------------------------------------------------

    pub async fn record_thought(
        &self,
        task_id: Uuid,
        agent_id: Option<Uuid>,
        content: &str,
        milestone: bool,
    ) -> ChainOfThoughtEntry {
        let mut thought = ChainOfThoughtEntry::new(task_id, content);
        thought.agent_id = agent_id;
        thought.milestone = milestone;
        let thought = self.log.record_thought(thought).await;
        if milestone {
            self.comment(task_id, format!("Milestone: {content}"));
        }
        thought
    }

    /// Append a log entry; success and error entries are also mirrored as
    /// issue comments.
    pub async fn append_and_comment(&self, entry: LogEntry) -> LogEntry {
        let entry = self.log.append(entry).await;
        if let (true, Some(task_id)) = (entry.level.is_notable(), entry.task_id) {
            self.comment(task_id, format!("[{}] {}", entry.level, entry.message));
        }
        entry
    }

    pub async fn report_action(&self, agent_id: Uuid, action: &str) -> DomainResult<()> {
        self.state
            .lock()
            .await
            .assignments
            .report_action(agent_id, action)
    }

    /// Progress channel for one dispatch.
    pub fn journal(self: &Arc<Self>, dispatch: &Dispatch) -> Arc<dyn AgentJournal> {
        Arc::new(TaskJournal {
            orchestrator: self.clone(),
            agent_id: dispatch.agent.id,
            agent_name: dispatch.agent.name.clone(),
            task_id: dispatch.task.id,
        })
    }

    fn comment(&self, task_id: Uuid, body: String) {
        if let Some(sync) = &self.sync {
            sync.enqueue(SyncEvent::Comment { task_id, body });
        }
    }

    /// Log transitions and queue them for the issue tracker.
    async fn mirror(&self, fleet: &FleetState, transitions: &[TaskTransition]) {
        for transition in transitions {
            self.log
                .log(
                    LogLevel::Debug,
                    format!("status {} -> {}", transition.from, transition.to),
                    Some(transition.task_id),
                    Some(SCHEDULER),
                )
                .await;
            if let (Some(sync), Some(task)) = (&self.sync, fleet.scheduler.task(transition.task_id)) {
                let mut snapshot = task.clone();
                // Each event carries the status of its own transition
                snapshot.status = transition.to;
                sync.enqueue(SyncEvent::Status(Box::new(snapshot)));
            }
        }
    }

    // ------------------------------------------------------------------
    // Sprints
    // ------------------------------------------------------------------

    pub async fn create_sprint(&self, sprint: Sprint) -> DomainResult<Uuid> {
        sprint.validate().map_err(OrchestrationError::Validation)?;
        let id = sprint.id;
        self.state.lock().await.sprints.insert(id, sprint);
        Ok(id)
    }

    async fn ensure_sprint(&self, name: &str) -> Uuid {
        let mut fleet = self.state.lock().await;
        if let Some(existing) = fleet.sprints.values().find(|s| s.name == name) {
            return existing.id;
        }
        let sprint = Sprint::new(name);
        let id = sprint.id;
        fleet.sprints.insert(id, sprint);
        id
    }

    pub async fn transition_sprint(&self, sprint_id: Uuid, to: SprintStatus) -> DomainResult<()> {
        let mut fleet = self.state.lock().await;
        let sprint = fleet
            .sprints
            .get_mut(&sprint_id)
            .ok_or(OrchestrationError::SprintNotFound(sprint_id))?;
        sprint.transition_to(to).map_err(OrchestrationError::Validation)
    }

    pub async fn add_to_sprint(&self, task_id: Uuid, sprint_id: Uuid) -> DomainResult<()> {
        let mut fleet = self.state.lock().await;
        if !fleet.sprints.contains_key(&sprint_id) {
            return Err(OrchestrationError::SprintNotFound(sprint_id));
        }
        fleet.scheduler.assign_sprint(task_id, sprint_id)
    }

    pub async fn sprint_report(&self, sprint_id: Uuid) -> DomainResult<SprintReport> {
        let fleet = self.state.lock().await;
        let sprint = fleet
            .sprints
            .get(&sprint_id)
            .ok_or(OrchestrationError::SprintNotFound(sprint_id))?;
        Ok(SprintReport::build(sprint, fleet.scheduler.tasks()))
    }

    pub async fn sprints(&self) -> Vec<Sprint> {
        self.state.lock().await.sprints.values().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn health(&self) -> SystemHealth {
        let fleet = self.state.lock().await;
        self.health.sample(
            &fleet.scheduler,
            &fleet.assignments,
            &self.latency,
            self.sync_degraded(),
            Utc::now(),
        )
    }

    pub async fn task(&self, task_id: Uuid) -> Option<Task> {
        self.state.lock().await.scheduler.task(task_id).cloned()
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.state.lock().await.scheduler.tasks().cloned().collect()
    }

    pub async fn agents(&self) -> Vec<Agent> {
        self.state.lock().await.assignments.agents().cloned().collect()
    }

    pub async fn bindings(&self) -> Vec<(Uuid, Uuid)> {
        self.state.lock().await.assignments.bindings().collect()
    }

    pub async fn verify_bindings(&self) -> DomainResult<()> {
        let fleet = self.state.lock().await;
        fleet.assignments.verify_bindings(&fleet.scheduler)
    }

    /// Number of tasks that are neither terminal nor archived.
    pub async fn live_tasks(&self) -> usize {
        self.state
            .lock()
            .await
            .scheduler
            .tasks()
            .filter(|t| !t.archived && t.status.is_active())
            .count()
    }

    pub async fn count_by_status(&self, status: TaskStatus) -> usize {
        self.state
            .lock()
            .await
            .scheduler
            .tasks()
            .filter(|t| t.status == status)
            .count()
    }
}

/// Writes new issue links back onto tasks.
struct FleetLinkWriter {
    state: Arc<Mutex<FleetState>>,
}

#[async_trait]
impl IssueLinkSink for FleetLinkWriter {
    async fn link_issue(&self, task_id: Uuid, issue: IssueRef) {
        if let Err(err) = self.state.lock().await.scheduler.set_issue_ref(task_id, issue) {
            warn!(task_id = %task_id, error = %err, "could not attach issue link");
        }
    }
}

/// [`AgentJournal`] bound to one dispatch.
struct TaskJournal {
    orchestrator: Arc<Orchestrator>,
    agent_id: Uuid,
    agent_name: String,
    task_id: Uuid,
}

#[async_trait]
impl AgentJournal for TaskJournal {
    async fn think(&self, content: &str, milestone: bool) {
        self.orchestrator
            .record_thought(self.task_id, Some(self.agent_id), content, milestone)
            .await;
    }

    async fn log(&self, level: LogLevel, message: &str) {
        self.orchestrator
            .append_and_comment(
                LogEntry::new(level, message)
                    .with_task(self.task_id)
                    .with_source(self.agent_name.clone()),
            )
            .await;
    }

    async fn report_action(&self, action: &str) {
        if let Err(err) = self.orchestrator.report_action(self.agent_id, action).await {
            warn!(agent_id = %self.agent_id, error = %err, "could not record agent action");
        }
    }
}
