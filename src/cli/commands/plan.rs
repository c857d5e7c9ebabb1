//! `cadre plan`: show the execution waves of a workflow.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;

use super::load_workflow;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::WorkflowDefinition;
use crate::services::DependencyResolver;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Workflow file
    pub file: PathBuf,
}

/// One task placed in a wave.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub wave: usize,
    pub key: String,
    pub title: String,
    pub persona: String,
    pub priority: String,
    pub depends_on: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub workflow: String,
    pub waves: usize,
    pub steps: Vec<PlanStep>,
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        format!(
            "Workflow {}: {} task(s) in {} wave(s)\n{}",
            self.workflow,
            self.steps.len(),
            self.waves,
            TableFormatter::new().format_plan(&self.steps)
        )
    }
}

/// Lay out a workflow wave by wave. Tasks in one wave have all their
/// dependencies in earlier waves.
pub fn build_plan(definition: &WorkflowDefinition) -> Result<PlanOutput> {
    let tasks = definition.to_tasks()?;
    let waves = DependencyResolver::new().execution_waves(&tasks)?;
    let keys = definition.keys_by_id();
    let specs: HashMap<&str, _> = definition
        .tasks
        .iter()
        .map(|spec| (spec.key.as_str(), spec))
        .collect();

    let mut steps = Vec::with_capacity(tasks.len());
    for (index, wave) in waves.iter().enumerate() {
        for id in wave {
            let Some(spec) = keys.get(id).and_then(|key| specs.get(key.as_str())) else {
                continue;
            };
            steps.push(PlanStep {
                wave: index + 1,
                key: spec.key.clone(),
                title: spec.title.clone(),
                persona: spec.persona.as_str().to_string(),
                priority: spec.priority.as_str().to_string(),
                depends_on: spec.depends_on.clone(),
            });
        }
    }

    Ok(PlanOutput {
        workflow: definition.name.clone(),
        waves: waves.len(),
        steps,
    })
}

pub async fn execute(args: PlanArgs, json_mode: bool) -> Result<()> {
    let definition = load_workflow(&args.file)?;
    output(&build_plan(&definition)?, json_mode);
    Ok(())
}
