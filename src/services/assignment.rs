//! Agent assignment manager.
//!
//! Binds ready tasks to idle agents of the matching persona and keeps the
//! (agent, task) bindings a partial bijection: no agent holds two tasks and
//! no task is held by two agents.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainResult, OrchestrationError};
use crate::domain::models::{Agent, AgentStatus, Persona, TaskOutcome, TaskStatus, TaskTransition};
use crate::services::scheduler::DependencyScheduler;

/// One agent bound to one task.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub agent_id: Uuid,
    pub task_id: Uuid,
    pub transitions: Vec<TaskTransition>,
}

/// Result of unbinding an agent.
#[derive(Debug, Clone)]
pub struct Release {
    pub agent_id: Uuid,
    pub task_id: Uuid,
    pub run_ms: u64,
    /// True when the task ended as cancelled rather than with the agent's outcome
    pub cancelled: bool,
    pub transitions: Vec<TaskTransition>,
}

#[derive(Debug, Default)]
pub struct AssignmentManager {
    agents: HashMap<Uuid, Agent>,
    /// Registration order, used to pick among idle agents
    order: Vec<Uuid>,
}

impl AssignmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_agent(&mut self, agent: Agent) -> DomainResult<()> {
        if self.agents.contains_key(&agent.id) {
            return Err(OrchestrationError::Validation(format!(
                "agent {} already registered",
                agent.id
            )));
        }
        info!(agent_id = %agent.id, name = %agent.name, persona = %agent.persona, "agent registered");
        self.order.push(agent.id);
        self.agents.insert(agent.id, agent);
        Ok(())
    }

    pub fn agent(&self, id: Uuid) -> DomainResult<&Agent> {
        self.agents.get(&id).ok_or(OrchestrationError::AgentNotFound(id))
    }

    fn agent_mut(&mut self, id: Uuid) -> DomainResult<&mut Agent> {
        self.agents
            .get_mut(&id)
            .ok_or(OrchestrationError::AgentNotFound(id))
    }

    /// Agents in registration order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> + '_ {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    pub fn count_by_status(&self, status: AgentStatus) -> usize {
        self.agents.values().filter(|a| a.status == status).count()
    }

    /// Agents that can take work now or after their current task.
    pub fn capacity(&self) -> usize {
        self.agents
            .values()
            .filter(|a| a.status != AgentStatus::Offline)
            .count()
    }

    /// Take an idle agent out of rotation. Busy agents must release first.
    pub fn set_offline(&mut self, id: Uuid) -> DomainResult<()> {
        let agent = self.agent_mut(id)?;
        if agent.status == AgentStatus::Busy {
            return Err(OrchestrationError::Validation(format!(
                "agent {id} is busy and must release its task before going offline"
            )));
        }
        agent.status = AgentStatus::Offline;
        Ok(())
    }

    pub fn set_online(&mut self, id: Uuid) -> DomainResult<()> {
        let agent = self.agent_mut(id)?;
        if agent.status == AgentStatus::Offline {
            agent.status = AgentStatus::Idle;
        }
        Ok(())
    }

    pub fn report_action(&mut self, id: Uuid, action: &str) -> DomainResult<()> {
        self.agent_mut(id)?.record_action(action);
        Ok(())
    }

    /// Current (agent, task) pairs.
    pub fn bindings(&self) -> impl Iterator<Item = (Uuid, Uuid)> + '_ {
        self.agents()
            .filter_map(|a| a.current_task.map(|task| (a.id, task)))
    }

    /// Bind ready tasks to idle agents. Tasks in `excluded` are skipped (the
    /// caller is handling them another way). Pairs are planned and checked
    /// before any state changes, so a race aborts the whole round.
    #[instrument(skip(self, scheduler, excluded))]
    pub fn assign(
        &mut self,
        scheduler: &mut DependencyScheduler,
        excluded: &HashSet<Uuid>,
    ) -> DomainResult<Vec<Assignment>> {
        let mut idle: HashMap<Persona, VecDeque<Uuid>> = HashMap::new();
        for agent in self.agents().filter(|a| a.is_idle()) {
            idle.entry(agent.persona).or_default().push_back(agent.id);
        }
        if idle.is_empty() {
            return Ok(Vec::new());
        }

        let mut plan = Vec::new();
        for task in scheduler.ready_tasks() {
            if excluded.contains(&task.id) {
                continue;
            }
            if let Some(agent_id) = idle.get_mut(&task.persona).and_then(VecDeque::pop_front) {
                plan.push((agent_id, task.id));
            }
        }

        self.verify_plan(scheduler, &plan)?;

        let now = Utc::now();
        let mut assignments = Vec::with_capacity(plan.len());
        for (agent_id, task_id) in plan {
            let transitions = scheduler.mark_started(task_id, agent_id)?;
            let agent = self.agent_mut(agent_id)?;
            agent.status = AgentStatus::Busy;
            agent.current_task = Some(task_id);
            agent.bound_at = Some(now);
            info!(agent_id = %agent_id, task_id = %task_id, "task assigned");
            assignments.push(Assignment {
                agent_id,
                task_id,
                transitions,
            });
        }
        Ok(assignments)
    }

    fn verify_plan(
        &self,
        scheduler: &DependencyScheduler,
        plan: &[(Uuid, Uuid)],
    ) -> DomainResult<()> {
        let bound_tasks: HashSet<Uuid> = self.bindings().map(|(_, task)| task).collect();
        let mut seen_agents = HashSet::new();
        let mut seen_tasks = HashSet::new();

        for &(agent_id, task_id) in plan {
            let agent = self.agent(agent_id)?;
            let task = scheduler.get(task_id)?;
            let detail = if !agent.is_idle() {
                Some("agent is not idle")
            } else if agent.persona != task.persona {
                Some("persona mismatch")
            } else if task.assigned_agent.is_some() || bound_tasks.contains(&task_id) {
                Some("task already bound")
            } else if !seen_agents.insert(agent_id) {
                Some("agent planned twice")
            } else if !seen_tasks.insert(task_id) {
                Some("task planned twice")
            } else {
                None
            };
            if let Some(detail) = detail {
                error!(agent_id = %agent_id, task_id = %task_id, detail, "assignment race");
                return Err(OrchestrationError::AssignmentRace {
                    agent: agent_id,
                    task: task_id,
                    detail: detail.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Unbind an agent and apply its outcome to the task. A task with a
    /// pending cancel ends as cancelled regardless of the outcome.
    #[instrument(skip(self, scheduler, outcome))]
    pub fn release(
        &mut self,
        agent_id: Uuid,
        outcome: &TaskOutcome,
        scheduler: &mut DependencyScheduler,
    ) -> DomainResult<Release> {
        let agent = self.agent(agent_id)?;
        let task_id = agent
            .current_task
            .ok_or(OrchestrationError::AgentNotBusy(agent_id))?;
        let task = scheduler.get(task_id)?;
        if task.assigned_agent != Some(agent_id) || task.status != TaskStatus::InProgress {
            error!(agent_id = %agent_id, task_id = %task_id, "binding mismatch on release");
            return Err(OrchestrationError::AssignmentRace {
                agent: agent_id,
                task: task_id,
                detail: format!("task is {} and bound to {:?}", task.status, task.assigned_agent),
            });
        }
        let cancelled = task.cancel_requested;

        let run_ms = self.unbind(agent_id, task_id, scheduler)?;
        let transitions = if cancelled {
            scheduler.finish_cancel(task_id)?
        } else {
            scheduler.on_task_completed(task_id, outcome)?
        };
        Ok(Release {
            agent_id,
            task_id,
            run_ms,
            cancelled,
            transitions,
        })
    }

    /// Like [`release`](Self::release), but a late report from an agent that
    /// no longer holds `task_id` is ignored.
    pub fn release_if_bound(
        &mut self,
        agent_id: Uuid,
        task_id: Uuid,
        outcome: &TaskOutcome,
        scheduler: &mut DependencyScheduler,
    ) -> DomainResult<Option<Release>> {
        if self.agent(agent_id)?.current_task != Some(task_id) {
            warn!(agent_id = %agent_id, task_id = %task_id, "ignoring late release");
            return Ok(None);
        }
        self.release(agent_id, outcome, scheduler).map(Some)
    }

    fn unbind(
        &mut self,
        agent_id: Uuid,
        task_id: Uuid,
        scheduler: &mut DependencyScheduler,
    ) -> DomainResult<u64> {
        let run_ms = scheduler.unbind(task_id)?;
        let agent = self.agent_mut(agent_id)?;
        agent.active_ms += run_ms;
        agent.current_task = None;
        agent.bound_at = None;
        agent.status = AgentStatus::Idle;
        Ok(run_ms)
    }

    /// Forcibly release agents whose binding outlived `window`. Their tasks
    /// become blocked with an agent-timeout blocker.
    #[instrument(skip(self, scheduler))]
    pub fn reap_timed_out(
        &mut self,
        window: chrono::Duration,
        now: DateTime<Utc>,
        scheduler: &mut DependencyScheduler,
    ) -> DomainResult<Vec<Release>> {
        let overdue: Vec<(Uuid, Uuid)> = self
            .agents()
            .filter(|a| a.is_overdue(window, now))
            .filter_map(|a| a.current_task.map(|task| (a.id, task)))
            .collect();

        let window_secs = u64::try_from(window.num_seconds()).unwrap_or(0);
        let mut reaped = Vec::with_capacity(overdue.len());
        for (agent_id, task_id) in overdue {
            let err = OrchestrationError::AgentTimeout {
                agent: agent_id,
                task: task_id,
            };
            warn!(error = %err, "reclaiming agent");
            let run_ms = self.unbind(agent_id, task_id, scheduler)?;
            let transitions = scheduler.block_for_timeout(task_id, agent_id, window_secs)?;
            reaped.push(Release {
                agent_id,
                task_id,
                run_ms,
                cancelled: false,
                transitions,
            });
        }
        Ok(reaped)
    }

    /// Check the partial bijection between busy agents and in-progress tasks.
    pub fn verify_bindings(&self, scheduler: &DependencyScheduler) -> DomainResult<()> {
        let mut tasks_seen = HashSet::new();
        for (agent_id, task_id) in self.bindings() {
            let race = |detail: &str| OrchestrationError::AssignmentRace {
                agent: agent_id,
                task: task_id,
                detail: detail.to_string(),
            };
            if !tasks_seen.insert(task_id) {
                return Err(race("task bound to two agents"));
            }
            let task = scheduler.get(task_id)?;
            if task.assigned_agent != Some(agent_id) {
                return Err(race("task does not point back at agent"));
            }
            if self.agent(agent_id)?.status != AgentStatus::Busy {
                return Err(race("bound agent is not busy"));
            }
        }
        for task in scheduler.tasks() {
            if let Some(agent_id) = task.assigned_agent {
                if self.agent(agent_id)?.current_task != Some(task.id) {
                    return Err(OrchestrationError::AssignmentRace {
                        agent: agent_id,
                        task: task.id,
                        detail: "agent does not point back at task".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Task, TaskPriority};

    fn setup(agents: &[Persona]) -> (AssignmentManager, Vec<Uuid>) {
        let mut manager = AssignmentManager::new();
        let mut ids = Vec::new();
        for (i, persona) in agents.iter().enumerate() {
            let agent = Agent::new(format!("{persona}-{i}"), *persona);
            ids.push(agent.id);
            manager.register_agent(agent).unwrap();
        }
        (manager, ids)
    }

    #[test]
    fn test_assign_matches_persona() {
        let (mut manager, agents) = setup(&[Persona::Qa, Persona::Developer]);
        let mut scheduler = DependencyScheduler::new();
        let dev_task = Task::new("impl", "", Persona::Developer);
        let id = dev_task.id;
        scheduler.register_task(dev_task).unwrap();

        let assigned = manager.assign(&mut scheduler, &HashSet::new()).unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].agent_id, agents[1]);
        assert_eq!(assigned[0].task_id, id);
        assert_eq!(scheduler.get(id).unwrap().status, TaskStatus::InProgress);
        assert_eq!(manager.agent(agents[0]).unwrap().status, AgentStatus::Idle);
        manager.verify_bindings(&scheduler).unwrap();
    }

    #[test]
    fn test_highest_priority_first_and_backlog() {
        let (mut manager, _) = setup(&[Persona::Developer]);
        let mut scheduler = DependencyScheduler::new();
        let normal = Task::new("normal", "", Persona::Developer);
        let high = Task::new("high", "", Persona::Developer).with_priority(TaskPriority::High);
        let high_id = high.id;
        let normal_id = normal.id;
        scheduler.register_batch(vec![normal, high]).unwrap();

        let assigned = manager.assign(&mut scheduler, &HashSet::new()).unwrap();
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].task_id, high_id);
        assert_eq!(scheduler.get(normal_id).unwrap().status, TaskStatus::Ready);

        // No idle agent left: nothing else happens
        assert!(manager.assign(&mut scheduler, &HashSet::new()).unwrap().is_empty());
    }

    #[test]
    fn test_excluded_tasks_skipped() {
        let (mut manager, _) = setup(&[Persona::Developer]);
        let mut scheduler = DependencyScheduler::new();
        let task = Task::new("t", "", Persona::Developer);
        let id = task.id;
        scheduler.register_task(task).unwrap();

        let assigned = manager
            .assign(&mut scheduler, &HashSet::from([id]))
            .unwrap();
        assert!(assigned.is_empty());
    }

    #[test]
    fn test_release_applies_outcome() {
        let (mut manager, agents) = setup(&[Persona::Developer]);
        let mut scheduler = DependencyScheduler::new();
        let task = Task::new("t", "", Persona::Developer);
        let id = task.id;
        scheduler.register_task(task).unwrap();
        manager.assign(&mut scheduler, &HashSet::new()).unwrap();

        let release = manager
            .release(agents[0], &TaskOutcome::success(vec![]), &mut scheduler)
            .unwrap();
        assert_eq!(release.task_id, id);
        assert!(!release.cancelled);
        assert_eq!(scheduler.get(id).unwrap().status, TaskStatus::Completed);
        assert!(manager.agent(agents[0]).unwrap().is_idle());

        assert!(matches!(
            manager.release(agents[0], &TaskOutcome::success(vec![]), &mut scheduler),
            Err(OrchestrationError::AgentNotBusy(_))
        ));
    }

    #[test]
    fn test_release_honours_cancel() {
        let (mut manager, agents) = setup(&[Persona::Developer]);
        let mut scheduler = DependencyScheduler::new();
        let task = Task::new("t", "", Persona::Developer);
        let id = task.id;
        scheduler.register_task(task).unwrap();
        manager.assign(&mut scheduler, &HashSet::new()).unwrap();
        scheduler.cancel(id).unwrap();

        let release = manager
            .release(agents[0], &TaskOutcome::success(vec![]), &mut scheduler)
            .unwrap();
        assert!(release.cancelled);
        assert_eq!(scheduler.get(id).unwrap().status, TaskStatus::Cancelled);
    }

    #[test]
    fn test_reap_then_late_release_ignored() {
        let (mut manager, agents) = setup(&[Persona::Developer]);
        let mut scheduler = DependencyScheduler::new();
        let task = Task::new("t", "", Persona::Developer);
        let id = task.id;
        scheduler.register_task(task).unwrap();
        manager.assign(&mut scheduler, &HashSet::new()).unwrap();

        let later = Utc::now() + chrono::Duration::seconds(120);
        let reaped = manager
            .reap_timed_out(chrono::Duration::seconds(60), later, &mut scheduler)
            .unwrap();
        assert_eq!(reaped.len(), 1);
        assert_eq!(scheduler.get(id).unwrap().status, TaskStatus::Blocked);
        assert!(manager.agent(agents[0]).unwrap().is_idle());

        let late = manager
            .release_if_bound(agents[0], id, &TaskOutcome::success(vec![]), &mut scheduler)
            .unwrap();
        assert!(late.is_none());
        assert_eq!(scheduler.get(id).unwrap().status, TaskStatus::Blocked);
    }

    #[test]
    fn test_offline_agents_not_assigned() {
        let (mut manager, agents) = setup(&[Persona::Developer]);
        manager.set_offline(agents[0]).unwrap();
        let mut scheduler = DependencyScheduler::new();
        scheduler
            .register_task(Task::new("t", "", Persona::Developer))
            .unwrap();

        assert!(manager.assign(&mut scheduler, &HashSet::new()).unwrap().is_empty());
        assert_eq!(manager.capacity(), 0);

        manager.set_online(agents[0]).unwrap();
        assert_eq!(manager.assign(&mut scheduler, &HashSet::new()).unwrap().len(), 1);
    }
}
