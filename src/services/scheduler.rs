//! Dependency scheduler.
//!
//! Owns the task graph and every task status change. Each mutation validates
//! before touching state, so a rejected call leaves the graph unchanged, and
//! returns the transitions it produced.

use chrono::Utc;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{
    Artifact, Blocker, IssueRef, Task, TaskOutcome, TaskStatus, TaskTransition,
};
use crate::services::dependency_resolver::{DependencyGraph, DependencyResolver};

#[derive(Debug, Default)]
pub struct DependencyScheduler {
    tasks: HashMap<Uuid, Task>,
    /// Registration order, the last ready-queue tie-breaker
    order: HashMap<Uuid, u64>,
    next_seq: u64,
    /// Reverse edges: task id → tasks that depend on it
    dependents: HashMap<Uuid, Vec<Uuid>>,
    resolver: DependencyResolver,
}

impl DependencyScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get(&self, id: Uuid) -> DomainResult<&Task> {
        self.tasks.get(&id).ok_or(OrchestrationError::TaskNotFound(id))
    }

    fn get_mut(&mut self, id: Uuid) -> DomainResult<&mut Task> {
        self.tasks
            .get_mut(&id)
            .ok_or(OrchestrationError::TaskNotFound(id))
    }

    /// All tasks in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        let mut all: Vec<&Task> = self.tasks.values().collect();
        all.sort_by_key(|t| self.order.get(&t.id).copied().unwrap_or(u64::MAX));
        all.into_iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn graph(&self) -> DependencyGraph {
        self.tasks
            .iter()
            .map(|(id, t)| (*id, t.depends_on.clone()))
            .collect()
    }

    pub fn dependents_of(&self, id: Uuid) -> &[Uuid] {
        self.dependents.get(&id).map_or(&[][..], Vec::as_slice)
    }

    /// Artifacts of the task's dependencies, in dependency order.
    pub fn dependency_outputs(&self, id: Uuid) -> DomainResult<Vec<&Artifact>> {
        let task = self.get(id)?;
        Ok(task
            .depends_on
            .iter()
            .filter_map(|dep| self.tasks.get(dep))
            .flat_map(|dep| dep.artifacts.iter())
            .collect())
    }

    fn deps_completed(&self, task: &Task) -> bool {
        task.depends_on.iter().all(|dep| {
            self.tasks
                .get(dep)
                .is_some_and(|d| d.status.is_success())
        })
    }

    /// First dependency that failed or was cancelled.
    fn dead_dependency(&self, task: &Task) -> Option<(Uuid, TaskStatus)> {
        task.depends_on.iter().find_map(|dep| {
            self.tasks.get(dep).and_then(|d| {
                matches!(d.status, TaskStatus::Failed | TaskStatus::Cancelled)
                    .then_some((*dep, d.status))
            })
        })
    }

    fn is_ready(&self, task: &Task) -> bool {
        matches!(task.status, TaskStatus::Ready | TaskStatus::Pending)
            && !task.archived
            && !task.cancel_requested
            && task.assigned_agent.is_none()
            && self.deps_completed(task)
    }

    /// Apply a status change through the task's transition table.
    fn transition(&mut self, id: Uuid, to: TaskStatus) -> DomainResult<TaskTransition> {
        let task = self.get_mut(id)?;
        let from = task.status;
        task.transition_to(to)
            .map_err(|_| OrchestrationError::InvalidStateTransition { task: id, from, to })?;
        debug!(task_id = %id, from = %from, to = %to, "task transition");
        Ok(TaskTransition {
            task_id: id,
            from,
            to,
            at: task.updated_at,
        })
    }

    /// Register a single task.
    pub fn register_task(&mut self, task: Task) -> DomainResult<Vec<TaskTransition>> {
        self.register_batch(vec![task])
    }

    /// Register several tasks atomically. Dependencies may point at earlier
    /// registrations or at other members of the batch, in any order.
    pub fn register_batch(&mut self, tasks: Vec<Task>) -> DomainResult<Vec<TaskTransition>> {
        let mut batch_ids = HashSet::new();
        for task in &tasks {
            task.validate().map_err(OrchestrationError::Validation)?;
            if self.tasks.contains_key(&task.id) || !batch_ids.insert(task.id) {
                return Err(OrchestrationError::DuplicateTask(task.id));
            }
        }

        let known: HashSet<Uuid> = self.tasks.keys().copied().collect();
        self.resolver.validate_dependencies(&tasks, &known)?;

        let mut graph = self.graph();
        graph.extend(DependencyResolver::graph_of(&tasks));
        if let Some(cycle) = self.resolver.detect_cycle(&graph) {
            warn!(cycle_len = cycle.len(), "rejecting registration that closes a cycle");
            return Err(OrchestrationError::CycleDetected(cycle));
        }

        let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
        for mut task in tasks {
            task.status = TaskStatus::Pending;
            task.assigned_agent = None;
            task.cancel_requested = false;
            for dep in &task.depends_on {
                self.dependents.entry(*dep).or_default().push(task.id);
            }
            self.order.insert(task.id, self.next_seq);
            self.next_seq += 1;
            self.tasks.insert(task.id, task);
        }

        let mut transitions = Vec::new();
        for id in &ids {
            transitions.extend(self.settle_new(*id)?);
        }
        info!(count = ids.len(), "registered tasks");
        Ok(transitions)
    }

    /// Initial placement of a freshly registered task.
    fn settle_new(&mut self, id: Uuid) -> DomainResult<Vec<TaskTransition>> {
        let task = self.get(id)?;
        if let Some((dep, status)) = self.dead_dependency(task) {
            let blocker = blocker_for(dep, status);
            let transition = self.transition(id, TaskStatus::Blocked)?;
            self.get_mut(id)?.blockers.push(blocker);
            return Ok(vec![transition]);
        }
        if self.deps_completed(task) {
            return Ok(vec![self.transition(id, TaskStatus::Ready)?]);
        }
        Ok(Vec::new())
    }

    /// Add one edge to a task that has not started yet.
    pub fn add_dependency(
        &mut self,
        task_id: Uuid,
        dependency: Uuid,
    ) -> DomainResult<Vec<TaskTransition>> {
        let task = self.get(task_id)?;
        self.get(dependency).map_err(|_| OrchestrationError::UnknownDependency {
            task: task_id,
            dependency,
        })?;
        if !matches!(task.status, TaskStatus::Pending | TaskStatus::Ready) {
            return Err(OrchestrationError::Validation(format!(
                "task {task_id} is {} and no longer accepts dependencies",
                task.status
            )));
        }
        if task.depends_on.contains(&dependency) {
            return Ok(Vec::new());
        }
        if let Some(cycle) = self
            .resolver
            .path_closing_edge(&self.graph(), task_id, dependency)
        {
            return Err(OrchestrationError::CycleDetected(cycle));
        }

        self.get_mut(task_id)?.depends_on.push(dependency);
        self.dependents.entry(dependency).or_default().push(task_id);

        let task = self.get(task_id)?;
        let mut transitions = Vec::new();
        if let Some((dep, status)) = self.dead_dependency(task) {
            transitions.push(self.transition(task_id, TaskStatus::Blocked)?);
            self.get_mut(task_id)?.blockers.push(blocker_for(dep, status));
        } else if task.status == TaskStatus::Ready && !self.deps_completed(task) {
            transitions.push(self.transition(task_id, TaskStatus::Pending)?);
        }
        Ok(transitions)
    }

    /// Tasks eligible to run, highest priority first, then oldest, then
    /// registration order. Side-effect free; call again to restart.
    pub fn ready_tasks(&self) -> impl Iterator<Item = &Task> + '_ {
        let mut ready: Vec<&Task> = self.tasks.values().filter(|t| self.is_ready(t)).collect();
        ready.sort_by_key(|t| {
            (
                Reverse(t.priority),
                t.created_at,
                self.order.get(&t.id).copied().unwrap_or(u64::MAX),
            )
        });
        ready.into_iter()
    }

    pub fn ready_count(&self) -> usize {
        self.tasks.values().filter(|t| self.is_ready(t)).count()
    }

    /// Bind a ready task to an agent: `ready → in_progress`.
    pub fn mark_started(
        &mut self,
        task_id: Uuid,
        agent_id: Uuid,
    ) -> DomainResult<Vec<TaskTransition>> {
        let task = self.get(task_id)?;
        if !self.is_ready(task) {
            return Err(OrchestrationError::InvalidStateTransition {
                task: task_id,
                from: task.status,
                to: TaskStatus::InProgress,
            });
        }
        let mut transitions = Vec::new();
        if task.status == TaskStatus::Pending {
            transitions.push(self.transition(task_id, TaskStatus::Ready)?);
        }
        transitions.push(self.transition(task_id, TaskStatus::InProgress)?);
        self.get_mut(task_id)?.assigned_agent = Some(agent_id);
        Ok(transitions)
    }

    /// Clear the agent binding and fold the run time into the task.
    /// Returns the run duration in milliseconds.
    pub fn unbind(&mut self, task_id: Uuid) -> DomainResult<u64> {
        let task = self.get_mut(task_id)?;
        task.assigned_agent = None;
        let run_ms = task
            .started_at
            .map(|started| (Utc::now() - started).num_milliseconds().max(0))
            .and_then(|ms| u64::try_from(ms).ok())
            .unwrap_or(0);
        task.elapsed_ms += run_ms;
        Ok(run_ms)
    }

    /// Record an agent's terminal outcome: `in_progress → completed | failed`.
    pub fn on_task_completed(
        &mut self,
        task_id: Uuid,
        outcome: &TaskOutcome,
    ) -> DomainResult<Vec<TaskTransition>> {
        let task = self.get(task_id)?;
        if task.status != TaskStatus::InProgress {
            let to = if outcome.is_success() {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            };
            return Err(OrchestrationError::InvalidStateTransition {
                task: task_id,
                from: task.status,
                to,
            });
        }

        match outcome {
            TaskOutcome::Success { artifacts } => self.succeed(task_id, artifacts),
            TaskOutcome::Failure { reason } => {
                let mut transitions = vec![self.transition(task_id, TaskStatus::Failed)?];
                info!(task_id = %task_id, reason = %reason, "task failed");
                transitions.extend(self.block_dependents(task_id, TaskStatus::Failed)?);
                Ok(transitions)
            }
        }
    }

    /// Fast-path a ready task straight to `completed` with a cached outcome.
    pub fn complete_from_cache(
        &mut self,
        task_id: Uuid,
        outcome: &TaskOutcome,
    ) -> DomainResult<Vec<TaskTransition>> {
        let task = self.get(task_id)?;
        let TaskOutcome::Success { artifacts } = outcome else {
            return Err(OrchestrationError::Validation(
                "only successful outcomes can complete a task from cache".to_string(),
            ));
        };
        if !self.is_ready(task) {
            return Err(OrchestrationError::InvalidStateTransition {
                task: task_id,
                from: task.status,
                to: TaskStatus::Completed,
            });
        }
        let mut transitions = Vec::new();
        if task.status == TaskStatus::Pending {
            transitions.push(self.transition(task_id, TaskStatus::Ready)?);
        }
        transitions.extend(self.succeed(task_id, artifacts)?);
        Ok(transitions)
    }

    fn succeed(
        &mut self,
        task_id: Uuid,
        artifacts: &[Artifact],
    ) -> DomainResult<Vec<TaskTransition>> {
        let mut transitions = vec![self.transition(task_id, TaskStatus::Completed)?];
        self.get_mut(task_id)?
            .artifacts
            .extend(artifacts.iter().cloned());

        let children = self.dependents_of(task_id).to_vec();
        for child in children {
            let task = self.get(child)?;
            if task.status == TaskStatus::Pending && self.deps_completed(task) {
                transitions.push(self.transition(child, TaskStatus::Ready)?);
            }
        }
        Ok(transitions)
    }

    /// Block every transitive dependent that has not started. Siblings
    /// outside the closure are untouched.
    fn block_dependents(
        &mut self,
        root: Uuid,
        cause: TaskStatus,
    ) -> DomainResult<Vec<TaskTransition>> {
        let closure = self.resolver.transitive_dependents(&self.dependents, root);
        let mut transitions = Vec::new();
        for id in closure {
            let status = self.get(id)?.status;
            if matches!(status, TaskStatus::Pending | TaskStatus::Ready) {
                transitions.push(self.transition(id, TaskStatus::Blocked)?);
                self.get_mut(id)?.blockers.push(blocker_for(root, cause));
            }
        }
        if !transitions.is_empty() {
            info!(root = %root, blocked = transitions.len(), "blocked dependents");
        }
        Ok(transitions)
    }

    /// Operator cancel. Tasks that have not started are cancelled at once
    /// and their dependents blocked; an in-progress task is only flagged
    /// and ends as cancelled when its agent releases it.
    pub fn cancel(&mut self, task_id: Uuid) -> DomainResult<Vec<TaskTransition>> {
        let status = self.get(task_id)?.status;
        match status {
            TaskStatus::InProgress => {
                self.get_mut(task_id)?.cancel_requested = true;
                info!(task_id = %task_id, "cancel requested for running task");
                Ok(Vec::new())
            }
            TaskStatus::Pending | TaskStatus::Ready | TaskStatus::Blocked => {
                self.finish_cancel(task_id)
            }
            from => Err(OrchestrationError::InvalidStateTransition {
                task: task_id,
                from,
                to: TaskStatus::Cancelled,
            }),
        }
    }

    /// Move a task to `cancelled` and block what depends on it.
    pub fn finish_cancel(&mut self, task_id: Uuid) -> DomainResult<Vec<TaskTransition>> {
        let mut transitions = vec![self.transition(task_id, TaskStatus::Cancelled)?];
        self.get_mut(task_id)?.cancel_requested = false;
        transitions.extend(self.block_dependents(task_id, TaskStatus::Cancelled)?);
        Ok(transitions)
    }

    /// Operator requeue of a blocked or failed task.
    pub fn requeue(&mut self, task_id: Uuid) -> DomainResult<Vec<TaskTransition>> {
        let task = self.get(task_id)?;
        if !matches!(task.status, TaskStatus::Blocked | TaskStatus::Failed) {
            return Err(OrchestrationError::InvalidStateTransition {
                task: task_id,
                from: task.status,
                to: TaskStatus::Ready,
            });
        }
        if let Some((dependency, status)) = self.dead_dependency(task) {
            return Err(OrchestrationError::UnresolvedBlocker {
                task: task_id,
                dependency,
                status,
            });
        }
        let to = if self.deps_completed(task) {
            TaskStatus::Ready
        } else {
            TaskStatus::Pending
        };
        let transition = self.transition(task_id, to)?;
        let task = self.get_mut(task_id)?;
        task.blockers.clear();
        task.cancel_requested = false;
        info!(task_id = %task_id, to = %to, "task requeued");
        Ok(vec![transition])
    }

    /// Operator hold: `pending/ready → blocked` with a note. Dependents stay
    /// pending; a requeue lifts the hold.
    pub fn hold(
        &mut self,
        task_id: Uuid,
        note: impl Into<String>,
    ) -> DomainResult<Vec<TaskTransition>> {
        let from = self.get(task_id)?.status;
        if !matches!(from, TaskStatus::Pending | TaskStatus::Ready) {
            return Err(OrchestrationError::InvalidStateTransition {
                task: task_id,
                from,
                to: TaskStatus::Blocked,
            });
        }
        let transition = self.transition(task_id, TaskStatus::Blocked)?;
        self.get_mut(task_id)?.blockers.push(Blocker::manual(note));
        Ok(vec![transition])
    }

    /// `in_progress → blocked` after the bound agent overran its window.
    pub fn block_for_timeout(
        &mut self,
        task_id: Uuid,
        agent_id: Uuid,
        window_secs: u64,
    ) -> DomainResult<Vec<TaskTransition>> {
        let transition = self.transition(task_id, TaskStatus::Blocked)?;
        self.get_mut(task_id)?
            .blockers
            .push(Blocker::agent_timeout(agent_id, window_secs));
        Ok(vec![transition])
    }

    /// Hide a terminal task from live views. Tasks are never deleted.
    pub fn archive(&mut self, task_id: Uuid) -> DomainResult<()> {
        let task = self.get_mut(task_id)?;
        if !task.is_terminal() {
            return Err(OrchestrationError::Validation(format!(
                "task {task_id} is {} and cannot be archived",
                task.status
            )));
        }
        task.archived = true;
        Ok(())
    }

    pub fn set_issue_ref(&mut self, task_id: Uuid, issue: IssueRef) -> DomainResult<()> {
        self.get_mut(task_id)?.issue_ref = Some(issue);
        Ok(())
    }

    pub fn assign_sprint(&mut self, task_id: Uuid, sprint_id: Uuid) -> DomainResult<()> {
        self.get_mut(task_id)?.sprint_id = Some(sprint_id);
        Ok(())
    }
}

fn blocker_for(dependency: Uuid, status: TaskStatus) -> Blocker {
    if status == TaskStatus::Cancelled {
        Blocker::dependency_cancelled(dependency)
    } else {
        Blocker::dependency_failed(dependency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ArtifactKind, BlockerReason, Persona, TaskPriority};

    fn task(title: &str) -> Task {
        Task::new(title, "", Persona::Developer)
    }

    fn run(scheduler: &mut DependencyScheduler, id: Uuid) {
        scheduler.mark_started(id, Uuid::new_v4()).unwrap();
    }

    fn ok() -> TaskOutcome {
        TaskOutcome::success(vec![Artifact::new("out.md", ArtifactKind::Document, 10)])
    }

    #[test]
    fn test_root_task_is_ready_on_registration() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let id = a.id;
        let transitions = scheduler.register_task(a).unwrap();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].to, TaskStatus::Ready);
        assert_eq!(scheduler.ready_tasks().map(|t| t.id).collect::<Vec<_>>(), vec![id]);
    }

    #[test]
    fn test_unknown_dependency_rejected() {
        let mut scheduler = DependencyScheduler::new();
        let ghost = Uuid::new_v4();
        let err = scheduler
            .register_task(task("a").with_dependency(ghost))
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::UnknownDependency { .. }));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        scheduler.register_task(a.clone()).unwrap();
        assert!(matches!(
            scheduler.register_task(a),
            Err(OrchestrationError::DuplicateTask(_))
        ));
    }

    #[test]
    fn test_batch_cycle_leaves_graph_unchanged() {
        let mut scheduler = DependencyScheduler::new();
        let root = task("root");
        scheduler.register_task(root.clone()).unwrap();

        let mut x = task("x");
        let mut y = task("y");
        x.depends_on = vec![y.id, root.id];
        y.depends_on = vec![x.id];

        let err = scheduler.register_batch(vec![x, y]).unwrap_err();
        assert!(matches!(err, OrchestrationError::CycleDetected(_)));
        assert_eq!(scheduler.len(), 1);
        assert!(scheduler.dependents_of(root.id).is_empty());
    }

    #[test]
    fn test_add_dependency_cycle_rejected() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let b = task("b").with_dependency(a.id);
        let (a_id, b_id) = (a.id, b.id);
        scheduler.register_batch(vec![a, b]).unwrap();

        let err = scheduler.add_dependency(a_id, b_id).unwrap_err();
        assert!(matches!(err, OrchestrationError::CycleDetected(path) if path.first() == Some(&a_id)));
        assert!(scheduler.get(a_id).unwrap().depends_on.is_empty());
        assert_eq!(scheduler.get(a_id).unwrap().status, TaskStatus::Ready);
    }

    #[test]
    fn test_add_dependency_demotes_ready_task() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let b = task("b");
        let (a_id, b_id) = (a.id, b.id);
        scheduler.register_batch(vec![a, b]).unwrap();

        let transitions = scheduler.add_dependency(b_id, a_id).unwrap();
        assert_eq!(transitions[0].to, TaskStatus::Pending);
        assert_eq!(scheduler.ready_count(), 1);
    }

    #[test]
    fn test_ready_order_priority_then_age() {
        let mut scheduler = DependencyScheduler::new();
        let low = task("low").with_priority(TaskPriority::Low);
        let first = task("first");
        let second = task("second");
        let urgent = task("urgent").with_priority(TaskPriority::Critical);
        let expected = vec![urgent.id, first.id, second.id, low.id];
        scheduler
            .register_batch(vec![low, first, second, urgent])
            .unwrap();

        let order: Vec<Uuid> = scheduler.ready_tasks().map(|t| t.id).collect();
        assert_eq!(order, expected);
        // restartable
        assert_eq!(scheduler.ready_tasks().count(), 4);
    }

    #[test]
    fn test_success_promotes_dependents_and_keeps_artifacts() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let b = task("b").with_dependency(a.id);
        let (a_id, b_id) = (a.id, b.id);
        scheduler.register_batch(vec![a, b]).unwrap();

        run(&mut scheduler, a_id);
        let transitions = scheduler.on_task_completed(a_id, &ok()).unwrap();
        assert!(transitions
            .iter()
            .any(|t| t.task_id == b_id && t.to == TaskStatus::Ready));
        assert_eq!(scheduler.get(a_id).unwrap().artifacts.len(), 1);
        assert_eq!(scheduler.dependency_outputs(b_id).unwrap().len(), 1);
    }

    #[test]
    fn test_failure_blocks_exact_closure() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let b = task("b").with_dependency(a.id);
        let c = task("c").with_dependency(b.id);
        let sibling = task("sibling");
        let ids = (a.id, b.id, c.id, sibling.id);
        scheduler.register_batch(vec![a, b, c, sibling]).unwrap();

        run(&mut scheduler, ids.0);
        scheduler
            .on_task_completed(ids.0, &TaskOutcome::failure("boom"))
            .unwrap();

        assert_eq!(scheduler.get(ids.1).unwrap().status, TaskStatus::Blocked);
        assert_eq!(scheduler.get(ids.2).unwrap().status, TaskStatus::Blocked);
        assert_eq!(scheduler.get(ids.3).unwrap().status, TaskStatus::Ready);
        assert_eq!(
            scheduler.get(ids.2).unwrap().blockers[0].reason,
            BlockerReason::DependencyFailed { task_id: ids.0 }
        );
    }

    #[test]
    fn test_completion_requires_in_progress() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let id = a.id;
        scheduler.register_task(a).unwrap();
        assert!(matches!(
            scheduler.on_task_completed(id, &ok()),
            Err(OrchestrationError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_complete_from_cache() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let id = a.id;
        scheduler.register_task(a).unwrap();

        assert!(scheduler
            .complete_from_cache(id, &TaskOutcome::failure("x"))
            .is_err());
        let transitions = scheduler.complete_from_cache(id, &ok()).unwrap();
        assert_eq!(transitions.last().unwrap().to, TaskStatus::Completed);
        assert!(scheduler.get(id).unwrap().assigned_agent.is_none());
    }

    #[test]
    fn test_cancel_pending_blocks_dependents() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let b = task("b").with_dependency(a.id);
        let (a_id, b_id) = (a.id, b.id);
        scheduler.register_batch(vec![a, b]).unwrap();

        scheduler.cancel(a_id).unwrap();
        assert_eq!(scheduler.get(a_id).unwrap().status, TaskStatus::Cancelled);
        assert_eq!(scheduler.get(b_id).unwrap().status, TaskStatus::Blocked);
        assert_eq!(scheduler.ready_count(), 0);
    }

    #[test]
    fn test_cancel_in_progress_is_cooperative() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let id = a.id;
        scheduler.register_task(a).unwrap();
        run(&mut scheduler, id);

        assert!(scheduler.cancel(id).unwrap().is_empty());
        let task = scheduler.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.cancel_requested);
    }

    #[test]
    fn test_requeue_rejects_dead_dependency() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let b = task("b").with_dependency(a.id);
        let (a_id, b_id) = (a.id, b.id);
        scheduler.register_batch(vec![a, b]).unwrap();
        run(&mut scheduler, a_id);
        scheduler
            .on_task_completed(a_id, &TaskOutcome::failure("x"))
            .unwrap();

        assert!(matches!(
            scheduler.requeue(b_id),
            Err(OrchestrationError::UnresolvedBlocker { dependency, .. }) if dependency == a_id
        ));

        // Requeue the failed root, then the dependent waits for it
        scheduler.requeue(a_id).unwrap();
        assert_eq!(scheduler.get(a_id).unwrap().status, TaskStatus::Ready);
        scheduler.requeue(b_id).unwrap();
        let b = scheduler.get(b_id).unwrap();
        assert_eq!(b.status, TaskStatus::Pending);
        assert!(b.blockers.is_empty());
    }

    #[test]
    fn test_timeout_block_and_archive() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let id = a.id;
        scheduler.register_task(a).unwrap();
        assert!(scheduler.archive(id).is_err());

        let agent = Uuid::new_v4();
        scheduler.mark_started(id, agent).unwrap();
        scheduler.unbind(id).unwrap();
        scheduler.block_for_timeout(id, agent, 60).unwrap();
        assert_eq!(
            scheduler.get(id).unwrap().blockers[0].reason,
            BlockerReason::AgentTimeout { agent_id: agent }
        );
        scheduler.archive(id).unwrap();
        assert!(scheduler.get(id).unwrap().archived);
    }

    #[test]
    fn test_hold_blocks_only_the_task_until_requeued() {
        let mut scheduler = DependencyScheduler::new();
        let a = task("a");
        let b = task("b").with_dependency(a.id);
        let (a_id, b_id) = (a.id, b.id);
        scheduler.register_batch(vec![a, b]).unwrap();

        scheduler.hold(a_id, "waiting on vendor contract").unwrap();
        let held = scheduler.get(a_id).unwrap();
        assert_eq!(held.status, TaskStatus::Blocked);
        assert!(matches!(
            &held.blockers[0].reason,
            BlockerReason::Manual { note } if note == "waiting on vendor contract"
        ));
        assert_eq!(scheduler.get(b_id).unwrap().status, TaskStatus::Pending);
        assert!(scheduler.hold(a_id, "again").is_err());

        scheduler.requeue(a_id).unwrap();
        assert_eq!(scheduler.get(a_id).unwrap().status, TaskStatus::Ready);
        assert!(scheduler.get(a_id).unwrap().blockers.is_empty());
    }
}
