//! `cadre run`: execute a workflow with the configured fleet.
//!
//! Agents run through the dry-run executor: every task is walked through
//! the journal and produces a placeholder artifact, so a workflow's
//! scheduling, caching and issue mirroring can be exercised end to end.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use super::load_workflow;
use crate::adapters::executors::DryRunExecutor;
use crate::adapters::github_issues::GithubIssueTracker;
use crate::adapters::memory::{InMemoryContextStore, InMemoryIssueLinkStore};
use crate::adapters::sqlite::{
    initialize_database, SqliteContextStore, SqliteIssueLinkStore, SqliteLogArchive,
};
use crate::application::{FleetRunner, Orchestrator, OrchestratorSettings, RunSummary};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::{Agent, Config, SystemHealth, Task};
use crate::domain::ports::{ContextStore, IssueLinkStore};
use crate::services::{ExecutionLog, SyncPolicy};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow file
    pub file: PathBuf,

    /// Keep cache, issue links and audit log in the configured database
    #[arg(long)]
    pub persist: bool,

    /// Skip the context cache for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Simulated work time per task, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub workflow: String,
    pub summary: RunSummary,
    pub health: SystemHealth,
    pub tasks: Vec<Task>,
    pub agents: Vec<Agent>,
    #[serde(skip)]
    keys: HashMap<Uuid, String>,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let formatter = TableFormatter::new();
        let rows: Vec<(String, &Task)> = self
            .tasks
            .iter()
            .map(|t| (self.keys.get(&t.id).cloned().unwrap_or_else(|| t.title.clone()), t))
            .collect();
        format!(
            "Workflow {}: {} completed, {} failed, {} blocked, {} stranded in {} ms\n{}\n{}\n{}",
            self.workflow,
            self.summary.completed,
            self.summary.failed,
            self.summary.blocked,
            self.summary.stranded,
            self.summary.elapsed_ms,
            formatter.format_tasks(&rows),
            formatter.format_agents(&self.agents),
            formatter.format_health(&self.health),
        )
    }
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let definition = load_workflow(&args.file)?;

    let mut settings = OrchestratorSettings::from(config);
    if args.no_cache {
        settings.cache_enabled = false;
    }

    let (store, links, log) = if args.persist {
        let pool = initialize_database(&config.database)
            .await
            .context("Failed to open state database")?;
        let store: Arc<dyn ContextStore> = Arc::new(SqliteContextStore::new(pool.clone()));
        let links: Arc<dyn IssueLinkStore> = Arc::new(SqliteIssueLinkStore::new(pool.clone()));
        let log = ExecutionLog::new().with_archive(Arc::new(SqliteLogArchive::new(pool)));
        (store, links, log)
    } else {
        let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
        let links: Arc<dyn IssueLinkStore> = Arc::new(InMemoryIssueLinkStore::new());
        (store, links, ExecutionLog::new())
    };

    let mut orchestrator = Orchestrator::new(store, settings).with_log(Arc::new(log));
    if config.sync.enabled {
        let tracker = GithubIssueTracker::from_config(&config.tracker)?;
        orchestrator =
            orchestrator.with_issue_sync(Arc::new(tracker), links, SyncPolicy::from(&config.sync));
        info!(owner = %config.tracker.owner, repo = %config.tracker.repo, "issue sync enabled");
    }
    let orchestrator = Arc::new(orchestrator);

    for (persona, count) in &config.fleet.agents {
        for n in 1..=*count {
            orchestrator
                .register_agent(Agent::new(format!("{}-{n}", persona.as_str()), *persona))
                .await?;
        }
    }
    orchestrator.register_workflow(&definition).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling running tasks");
            let _ = shutdown_tx.send(true);
        }
    });

    let executor = DryRunExecutor::new().with_delay(Duration::from_millis(args.delay_ms));
    let summary = FleetRunner::new(
        orchestrator.clone(),
        Arc::new(executor),
        Duration::from_millis(config.scheduler.poll_interval_ms),
    )
    .with_shutdown(shutdown_rx)
    .run_until_idle()
    .await?;

    let workflow_id = definition.id();
    let result = RunOutput {
        workflow: definition.name.clone(),
        health: orchestrator.health().await,
        tasks: orchestrator
            .tasks()
            .await
            .into_iter()
            .filter(|t| t.workflow_id == workflow_id)
            .collect(),
        agents: orchestrator.agents().await,
        keys: definition.keys_by_id(),
        summary,
    };
    output(&result, json_mode);

    let unfinished = result.summary.failed + result.summary.blocked + result.summary.stranded;
    if unfinished > 0 {
        bail!("{unfinished} task(s) did not complete");
    }
    Ok(())
}
