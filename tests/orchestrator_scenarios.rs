//! End-to-end scenarios driven through the orchestrator API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use cadre::adapters::executors::DryRunExecutor;
use cadre::adapters::memory::InMemoryContextStore;
use cadre::application::FleetRunner;
use cadre::domain::models::{
    AgentStatus, Artifact, ArtifactKind, LogLevel, Persona, Task, TaskOutcome, TaskStatus,
    WorkflowDefinition,
};
use cadre::OrchestrationError;
use common::{add_agents, orchestrator, orchestrator_with_store};

fn produced(name: &str) -> TaskOutcome {
    TaskOutcome::success(vec![Artifact::new(name, ArtifactKind::Code, 120)])
}

#[tokio::test]
async fn test_failure_blocks_downstream_chain() {
    let orch = orchestrator();
    let agents = add_agents(&orch, &[("dev-1", Persona::Developer)]).await;

    let a = Task::new("Schema", "tables", Persona::Developer);
    let b = Task::new("Repository", "queries", Persona::Developer).with_dependency(a.id);
    let c = Task::new("Endpoint", "handlers", Persona::Developer).with_dependency(b.id);
    let (a_id, b_id, c_id) = (a.id, b.id, c.id);
    orch.register_tasks(vec![a, b, c]).await.unwrap();

    let first = orch.dispatch().await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].task.id, a_id);
    orch.complete(agents[0], a_id, produced("schema.sql"))
        .await
        .unwrap();

    let second = orch.dispatch().await.unwrap();
    assert_eq!(second[0].task.id, b_id);
    orch.complete(agents[0], b_id, TaskOutcome::failure("compile error"))
        .await
        .unwrap();

    assert_eq!(orch.task(a_id).await.unwrap().status, TaskStatus::Completed);
    assert_eq!(orch.task(b_id).await.unwrap().status, TaskStatus::Failed);
    let blocked = orch.task(c_id).await.unwrap();
    assert_eq!(blocked.status, TaskStatus::Blocked);
    assert_eq!(blocked.blockers[0].blocking_task(), Some(b_id));

    assert!(orch.dispatch().await.unwrap().is_empty());
    assert_eq!(orch.live_tasks().await, 0);
}

#[tokio::test]
async fn test_failed_task_can_be_requeued() {
    let orch = orchestrator();
    let agents = add_agents(&orch, &[("dev-1", Persona::Developer)]).await;
    let task = Task::new("Flaky build", "", Persona::Developer);
    let id = task.id;
    orch.register_task(task).await.unwrap();

    orch.dispatch().await.unwrap();
    orch.complete(agents[0], id, TaskOutcome::failure("network"))
        .await
        .unwrap();
    assert_eq!(orch.task(id).await.unwrap().status, TaskStatus::Failed);

    orch.requeue(id).await.unwrap();
    let retry = orch.dispatch().await.unwrap();
    assert_eq!(retry.len(), 1);
    orch.complete(agents[0], id, produced("build.log"))
        .await
        .unwrap();
    assert_eq!(orch.task(id).await.unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_cache_hit_completes_without_assignment() {
    let store = Arc::new(InMemoryContextStore::new());

    // First fleet does the work and fills the cache
    let warm = orchestrator_with_store(store.clone());
    let agents = add_agents(&warm, &[("dev-1", Persona::Developer)]).await;
    let original = Task::new("Generate client", "from openapi.yaml", Persona::Developer);
    let original_id = original.id;
    warm.register_task(original).await.unwrap();
    warm.dispatch().await.unwrap();
    warm.complete(agents[0], original_id, produced("client.rs"))
        .await
        .unwrap();
    assert_eq!(store.len().await, 1);

    // Identical work in a second fleet is answered from the cache
    let cold = orchestrator_with_store(store);
    add_agents(&cold, &[("dev-1", Persona::Developer)]).await;
    let repeat = Task::new("Generate client", "from openapi.yaml", Persona::Developer);
    let repeat_id = repeat.id;
    cold.register_task(repeat).await.unwrap();

    let dispatches = cold.dispatch().await.unwrap();
    assert!(dispatches.is_empty());
    let task = cold.task(repeat_id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.artifacts[0].name, "client.rs");
    assert!(cold.agents().await.iter().all(|a| a.status == AgentStatus::Idle));
}

#[tokio::test]
async fn test_shared_fingerprint_dispatches_once() {
    let orch = orchestrator();
    let agents = add_agents(
        &orch,
        &[("dev-1", Persona::Developer), ("dev-2", Persona::Developer)],
    )
    .await;

    let first = Task::new("Format sources", "cargo fmt", Persona::Developer);
    let second = Task::new("Format sources", "cargo fmt", Persona::Developer);
    let (first_id, second_id) = (first.id, second.id);
    orch.register_tasks(vec![first, second]).await.unwrap();

    let dispatches = orch.dispatch().await.unwrap();
    assert_eq!(dispatches.len(), 1, "only the leader runs");
    let leader = dispatches[0].task.id;
    let bound_agent = dispatches[0].agent.id;
    assert!(agents.contains(&bound_agent));

    // Nothing else to hand out while the leader is running
    assert!(orch.dispatch().await.unwrap().is_empty());

    orch.complete(bound_agent, leader, produced("fmt.diff"))
        .await
        .unwrap();
    for id in [first_id, second_id] {
        assert_eq!(orch.task(id).await.unwrap().status, TaskStatus::Completed);
    }
}

#[tokio::test]
async fn test_leader_completes_after_follower_gains_dependency() {
    let orch = orchestrator();
    let agents = add_agents(&orch, &[("dev-1", Persona::Developer)]).await;

    let x = Task::new("Vendor deps", "cargo vendor", Persona::Developer);
    let y = Task::new("Vendor deps", "cargo vendor", Persona::Developer);
    let (x_id, y_id) = (x.id, y.id);
    orch.register_tasks(vec![x, y]).await.unwrap();

    let dispatches = orch.dispatch().await.unwrap();
    assert_eq!(dispatches.len(), 1);
    let (leader, follower) = if dispatches[0].task.id == x_id {
        (x_id, y_id)
    } else {
        (y_id, x_id)
    };

    // The follower's inputs change while the leader is still running
    let audit = Task::new("License audit", "", Persona::Qa);
    let audit_id = audit.id;
    orch.register_task(audit).await.unwrap();
    orch.add_dependency(follower, audit_id).await.unwrap();
    assert_eq!(orch.task(follower).await.unwrap().status, TaskStatus::Pending);

    let release = orch
        .complete(agents[0], leader, produced("vendor.tar"))
        .await
        .unwrap();
    assert!(release.is_some());
    assert_eq!(orch.task(leader).await.unwrap().status, TaskStatus::Completed);
    assert_eq!(orch.task(follower).await.unwrap().status, TaskStatus::Pending);
    assert!(orch
        .log()
        .entries_for(leader)
        .await
        .any(|e| e.level == LogLevel::Success && e.message.starts_with("completed with")));
    orch.verify_bindings().await.unwrap();
}

#[tokio::test]
async fn test_held_follower_is_not_completed_by_leader() {
    let orch = orchestrator();
    let agents = add_agents(&orch, &[("dev-1", Persona::Developer)]).await;
    let x = Task::new("Regenerate bindings", "", Persona::Developer);
    let y = Task::new("Regenerate bindings", "", Persona::Developer);
    let (x_id, y_id) = (x.id, y.id);
    orch.register_tasks(vec![x, y]).await.unwrap();

    let leader = orch.dispatch().await.unwrap().remove(0).task.id;
    let follower = if leader == x_id { y_id } else { x_id };
    orch.hold(follower, "needs header update first").await.unwrap();

    orch.complete(agents[0], leader, produced("bindings.rs"))
        .await
        .unwrap();
    assert_eq!(orch.task(follower).await.unwrap().status, TaskStatus::Blocked);

    // Requeued, it resolves from the recorded outcome
    orch.requeue(follower).await.unwrap();
    assert!(orch.dispatch().await.unwrap().is_empty());
    assert_eq!(orch.task(follower).await.unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_failed_leader_releases_follower() {
    let orch = orchestrator();
    add_agents(
        &orch,
        &[("dev-1", Persona::Developer), ("dev-2", Persona::Developer)],
    )
    .await;
    orch.register_tasks(vec![
        Task::new("Lint", "clippy", Persona::Developer),
        Task::new("Lint", "clippy", Persona::Developer),
    ])
    .await
    .unwrap();

    let leader = orch.dispatch().await.unwrap().remove(0);
    orch.complete(leader.agent.id, leader.task.id, TaskOutcome::failure("boom"))
        .await
        .unwrap();

    // The follower gets its own attempt
    let retry = orch.dispatch().await.unwrap();
    assert_eq!(retry.len(), 1);
    assert_ne!(retry[0].task.id, leader.task.id);
}

#[tokio::test]
async fn test_cycle_rejected_and_graph_unchanged() {
    let orch = orchestrator();
    let a = Task::new("A", "", Persona::Architect);
    let b = Task::new("B", "", Persona::Developer).with_dependency(a.id);
    let (a_id, b_id) = (a.id, b.id);
    orch.register_tasks(vec![a, b]).await.unwrap();

    let err = orch.add_dependency(a_id, b_id).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::CycleDetected(_)));
    assert!(err.to_string().starts_with("Task dependency cycle detected"));

    let a = orch.task(a_id).await.unwrap();
    assert!(a.depends_on.is_empty());
    assert_eq!(a.status, TaskStatus::Ready);
    assert_eq!(orch.task(b_id).await.unwrap().status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_cancel_running_task_ends_cancelled() {
    let orch = orchestrator();
    let agents = add_agents(&orch, &[("qa-1", Persona::Qa)]).await;
    let check = Task::new("Smoke test", "", Persona::Qa);
    let report = Task::new("Report", "", Persona::Qa).with_dependency(check.id);
    let (check_id, report_id) = (check.id, report.id);
    orch.register_tasks(vec![check, report]).await.unwrap();

    let dispatch = orch.dispatch().await.unwrap().remove(0);
    orch.cancel(check_id).await.unwrap();
    assert!(*dispatch.cancel.borrow());

    // The agent finishes anyway; the cancel wins
    let release = orch
        .complete(agents[0], check_id, produced("smoke.txt"))
        .await
        .unwrap()
        .unwrap();
    assert!(release.cancelled);
    assert_eq!(orch.task(check_id).await.unwrap().status, TaskStatus::Cancelled);
    assert_eq!(orch.task(report_id).await.unwrap().status, TaskStatus::Blocked);
}

#[tokio::test]
async fn test_timed_out_agent_is_reclaimed() {
    let orch = orchestrator();
    let agents = add_agents(&orch, &[("dev-1", Persona::Developer)]).await;
    let task = Task::new("Long migration", "", Persona::Developer);
    let id = task.id;
    orch.register_task(task).await.unwrap();
    orch.dispatch().await.unwrap();

    let later = chrono::Utc::now() + chrono::Duration::days(1);
    let reaped = orch.reap_timed_out_at(later).await.unwrap();
    assert_eq!(reaped.len(), 1);
    assert_eq!(orch.task(id).await.unwrap().status, TaskStatus::Blocked);
    assert!(orch.bindings().await.is_empty());

    // A late report from the reclaimed agent is ignored
    let late = orch.complete(agents[0], id, produced("late.sql")).await.unwrap();
    assert!(late.is_none());
    let errors = orch
        .log()
        .entries_for(id)
        .await
        .filter(|e| e.level == LogLevel::Error)
        .count();
    assert_eq!(errors, 1);
}

#[tokio::test]
async fn test_workflow_runs_to_completion_with_mixed_fleet() {
    let definition = WorkflowDefinition::from_yaml(
        r"
name: onboarding
sprint: sprint-12
tasks:
  - key: design
    title: Design signup flow
    persona: architect
  - key: backend
    title: Signup endpoint
    persona: developer
    depends_on: [design]
  - key: frontend
    title: Signup form
    persona: developer
    depends_on: [design]
  - key: verify
    title: Verify signup
    persona: qa
    depends_on: [backend, frontend]
",
    )
    .unwrap();

    let orch = orchestrator();
    add_agents(
        &orch,
        &[
            ("arch-1", Persona::Architect),
            ("dev-1", Persona::Developer),
            ("dev-2", Persona::Developer),
            ("qa-1", Persona::Qa),
        ],
    )
    .await;
    orch.register_workflow(&definition).await.unwrap();

    let summary = FleetRunner::new(
        orch.clone(),
        Arc::new(DryRunExecutor::new().with_delay(Duration::from_millis(5))),
        Duration::from_millis(20),
    )
    .run_until_idle()
    .await
    .unwrap();

    assert_eq!(summary.completed, 4);
    assert_eq!(summary.failed + summary.blocked + summary.stranded, 0);
    orch.verify_bindings().await.unwrap();

    let sprints = orch.sprints().await;
    assert_eq!(sprints.len(), 1);
    let report = orch.sprint_report(sprints[0].id).await.unwrap();
    assert_eq!(report.total, 4);
    assert_eq!(report.by_status.get("completed"), Some(&4));
}

#[tokio::test]
async fn test_executor_failure_surfaces_in_summary() {
    let orch = orchestrator();
    add_agents(&orch, &[("dev-1", Persona::Developer)]).await;
    let build = Task::new("Build", "", Persona::Developer);
    let package = Task::new("Package", "", Persona::Developer).with_dependency(build.id);
    orch.register_tasks(vec![build, package]).await.unwrap();

    let executor = DryRunExecutor::new().fail_titled("Build", "linker not found");
    let summary = FleetRunner::new(orch, Arc::new(executor), Duration::from_millis(20))
        .run_until_idle()
        .await
        .unwrap();

    assert_eq!(summary.dispatched, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.blocked, 1);
}
