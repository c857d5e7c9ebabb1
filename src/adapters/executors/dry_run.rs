//! Dry-run executor.
//!
//! Walks every dispatched task through the journal without doing real work
//! and produces a placeholder artifact per persona. Useful for validating a
//! workflow's shape end to end and for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

use crate::domain::models::{Artifact, ArtifactKind, LogLevel, Persona, TaskOutcome};
use crate::domain::ports::{AgentExecutor, ExecutionContext};

#[derive(Debug, Default)]
pub struct DryRunExecutor {
    delay: Duration,
    /// Task title → failure reason
    failures: HashMap<String, String>,
    executions: AtomicUsize,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated work time per task.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail any task with this title.
    pub fn fail_titled(mut self, title: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(title.into(), reason.into());
        self
    }

    /// Number of `execute` calls so far.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

fn placeholder(persona: Persona, title: &str) -> Artifact {
    let slug: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let (name, kind) = match persona {
        Persona::ProductManager => (format!("{slug}-requirements.md"), ArtifactKind::Document),
        Persona::Architect => (format!("{slug}-design.md"), ArtifactKind::Document),
        Persona::Developer => (format!("src/{slug}.rs"), ArtifactKind::Code),
        Persona::Qa => (format!("{slug}-test-report.md"), ArtifactKind::Report),
        Persona::Devops => (format!("deploy/{slug}.yaml"), ArtifactKind::File),
        Persona::TechWriter => (format!("docs/{slug}.md"), ArtifactKind::Document),
    };
    Artifact::new(name, kind, 0).with_line_count(0)
}

async fn cancelled(cancel: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    if *cancel.borrow() {
        return true;
    }
    if delay.is_zero() {
        return false;
    }
    tokio::select! {
        () = tokio::time::sleep(delay) => *cancel.borrow(),
        changed = cancel.changed() => changed.is_ok() && *cancel.borrow(),
    }
}

#[async_trait]
impl AgentExecutor for DryRunExecutor {
    async fn execute(&self, mut ctx: ExecutionContext) -> TaskOutcome {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let journal = ctx.journal.clone();
        journal
            .think(&format!("dry run of \"{}\"", ctx.task.title), false)
            .await;
        journal.report_action("simulating work").await;

        if cancelled(&mut ctx.cancel, self.delay).await {
            journal.log(LogLevel::Warning, "stopping: task cancelled").await;
            return TaskOutcome::failure("cancelled");
        }

        if let Some(reason) = self.failures.get(&ctx.task.title) {
            return TaskOutcome::failure(reason.clone());
        }

        journal.think("work complete", true).await;
        TaskOutcome::success(vec![placeholder(ctx.task.persona, &ctx.task.title)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_names() {
        let artifact = placeholder(Persona::Developer, "Add Login");
        assert_eq!(artifact.name, "src/add-login.rs");
        assert_eq!(artifact.kind, ArtifactKind::Code);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_delay() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { cancelled(&mut rx, Duration::from_secs(30)).await });
        tx.send(true).unwrap();
        assert!(waiter.await.unwrap());
    }
}
