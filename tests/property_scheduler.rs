//! Property tests for the dependency scheduler and assignment manager.

use cadre::domain::models::{Agent, Persona, Task, TaskOutcome, TaskStatus};
use cadre::services::{AssignmentManager, DependencyScheduler};
use cadre::OrchestrationError;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashSet;
use uuid::Uuid;

/// Acyclic graph: task `i` may only depend on tasks with a lower index.
fn build_dag(size: usize, edges: &[(usize, usize)]) -> Vec<Task> {
    let mut tasks: Vec<Task> = (0..size)
        .map(|i| Task::new(format!("task {i}"), "property test", Persona::Developer))
        .collect();
    for &(a, b) in edges {
        let (child, parent) = (a % size, b % size);
        if parent < child {
            let parent_id = tasks[parent].id;
            tasks[child] = tasks[child].clone().with_dependency(parent_id);
        }
    }
    tasks
}

fn check_ready_sound(scheduler: &DependencyScheduler) -> Result<(), TestCaseError> {
    for task in scheduler.ready_tasks() {
        for dep in &task.depends_on {
            let status = scheduler.task(*dep).map(|d| d.status);
            prop_assert_eq!(
                status,
                Some(TaskStatus::Completed),
                "ready task {} has unfinished dependency {}",
                task.id,
                dep
            );
        }
    }
    Ok(())
}

fn dag_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..16, prop::collection::vec((0usize..16, 0usize..16), 0..40))
}

proptest! {
    /// Property: a task is only ever offered once all its dependencies completed
    #[test]
    fn prop_ready_tasks_have_completed_dependencies(
        (size, edges) in dag_strategy(),
        outcomes in prop::collection::vec(any::<bool>(), 16),
        fleet_size in 1usize..4,
    ) {
        let mut scheduler = DependencyScheduler::new();
        scheduler
            .register_batch(build_dag(size, &edges))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        check_ready_sound(&scheduler)?;

        let mut manager = AssignmentManager::new();
        for n in 0..fleet_size {
            manager
                .register_agent(Agent::new(format!("dev-{n}"), Persona::Developer))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }

        let mut step = 0;
        loop {
            let assignments = manager
                .assign(&mut scheduler, &HashSet::new())
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            if assignments.is_empty() {
                break;
            }
            manager
                .verify_bindings(&scheduler)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            for assignment in assignments {
                let outcome = if outcomes[step % outcomes.len()] {
                    TaskOutcome::success(Vec::new())
                } else {
                    TaskOutcome::failure("scripted failure")
                };
                step += 1;
                manager
                    .release(assignment.agent_id, &outcome, &mut scheduler)
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                check_ready_sound(&scheduler)?;
            }
        }

        // Everything settled: nothing left runnable or running
        for task in scheduler.tasks() {
            prop_assert!(
                matches!(task.status, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Blocked),
                "task {} ended as {}",
                task.id,
                task.status
            );
        }
    }

    /// Property: busy agents and in-progress tasks stay in one-to-one correspondence
    #[test]
    fn prop_bindings_are_a_bijection(
        (size, edges) in dag_strategy(),
        releases in prop::collection::vec(0usize..8, 1..24),
    ) {
        let mut scheduler = DependencyScheduler::new();
        scheduler
            .register_batch(build_dag(size, &edges))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut manager = AssignmentManager::new();
        for n in 0..3 {
            manager
                .register_agent(Agent::new(format!("dev-{n}"), Persona::Developer))
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }

        for pick in releases {
            manager
                .assign(&mut scheduler, &HashSet::new())
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            let bound: Vec<(Uuid, Uuid)> = manager.bindings().collect();
            let in_progress = scheduler
                .tasks()
                .filter(|t| t.status == TaskStatus::InProgress)
                .count();
            prop_assert_eq!(bound.len(), in_progress);
            manager
                .verify_bindings(&scheduler)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            if bound.is_empty() {
                break;
            }
            let (agent_id, _) = bound[pick % bound.len()];
            manager
                .release(agent_id, &TaskOutcome::success(Vec::new()), &mut scheduler)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
        }
    }

    /// Property: an edge that would close a cycle is rejected and changes nothing
    #[test]
    fn prop_cycle_closing_edge_is_rejected(size in 2usize..12) {
        // Straight chain 0 <- 1 <- ... <- n-1
        let mut tasks: Vec<Task> = Vec::with_capacity(size);
        for i in 0..size {
            let task = Task::new(format!("link {i}"), "", Persona::Developer);
            let task = match tasks.last() {
                Some(prev) => task.with_dependency(prev.id),
                None => task,
            };
            tasks.push(task);
        }
        let first = tasks[0].id;
        let last = tasks[size - 1].id;

        let mut scheduler = DependencyScheduler::new();
        scheduler
            .register_batch(tasks)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        let result = scheduler.add_dependency(first, last);
        prop_assert!(matches!(result, Err(OrchestrationError::CycleDetected(_))));

        let head = scheduler.task(first).ok_or_else(|| TestCaseError::fail("head missing"))?;
        prop_assert!(head.depends_on.is_empty());
        prop_assert_eq!(head.status, TaskStatus::Ready);
        prop_assert!(scheduler.dependents_of(last).is_empty());
    }
}
