//! Workflow definitions.
//!
//! A workflow is a YAML document naming a set of tasks by local `key`. Task
//! ids are derived from the workflow name and key, so a restarted process
//! maps the same task to the same persisted issue link.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::agent::Persona;
use super::task::{Task, TaskPriority};
use crate::domain::errors::{DomainResult, OrchestrationError};

/// One task entry in a workflow file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTaskSpec {
    /// Local identifier, unique within the workflow
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub persona: Persona,
    #[serde(default)]
    pub priority: TaskPriority,
    /// Keys of tasks this one depends on
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Optional sprint the workflow's tasks are reported under
    #[serde(default)]
    pub sprint: Option<String>,
    pub tasks: Vec<WorkflowTaskSpec>,
}

impl WorkflowDefinition {
    pub fn from_yaml(yaml: &str) -> DomainResult<Self> {
        let def: Self = serde_yaml::from_str(yaml)
            .map_err(|e| OrchestrationError::Serialization(e.to_string()))?;
        def.validate()?;
        Ok(def)
    }

    /// Stable workflow id derived from the name.
    pub fn id(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.name.as_bytes())
    }

    /// Stable task id for a key within this workflow.
    pub fn task_id(&self, key: &str) -> Uuid {
        Uuid::new_v5(&self.id(), key.as_bytes())
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(OrchestrationError::Validation(
                "workflow name cannot be empty".to_string(),
            ));
        }
        if self.tasks.is_empty() {
            return Err(OrchestrationError::Validation(format!(
                "workflow '{}' has no tasks",
                self.name
            )));
        }

        let mut keys = HashSet::new();
        for spec in &self.tasks {
            if spec.key.trim().is_empty() {
                return Err(OrchestrationError::Validation(
                    "task key cannot be empty".to_string(),
                ));
            }
            if !keys.insert(spec.key.as_str()) {
                return Err(OrchestrationError::Validation(format!(
                    "duplicate task key '{}'",
                    spec.key
                )));
            }
        }

        for spec in &self.tasks {
            for dep in &spec.depends_on {
                if !keys.contains(dep.as_str()) {
                    return Err(OrchestrationError::Validation(format!(
                        "task '{}' depends on unknown key '{dep}'",
                        spec.key
                    )));
                }
                if dep == &spec.key {
                    return Err(OrchestrationError::Validation(format!(
                        "task '{}' depends on itself",
                        spec.key
                    )));
                }
            }
        }
        Ok(())
    }

    /// Build tasks in file order. Cycle detection is left to the scheduler.
    pub fn to_tasks(&self) -> DomainResult<Vec<Task>> {
        self.validate()?;
        let workflow_id = self.id();
        let ids: HashMap<&str, Uuid> = self
            .tasks
            .iter()
            .map(|spec| (spec.key.as_str(), self.task_id(&spec.key)))
            .collect();

        let tasks = self
            .tasks
            .iter()
            .map(|spec| {
                let mut task = Task::new(&spec.title, &spec.description, spec.persona)
                    .with_id(ids[spec.key.as_str()])
                    .with_priority(spec.priority)
                    .with_workflow(workflow_id);
                for dep in &spec.depends_on {
                    task = task.with_dependency(ids[dep.as_str()]);
                }
                task
            })
            .collect();
        Ok(tasks)
    }

    /// Map from task id back to key, for display.
    pub fn keys_by_id(&self) -> HashMap<Uuid, String> {
        self.tasks
            .iter()
            .map(|spec| (self.task_id(&spec.key), spec.key.clone()))
            .collect()
    }
}
