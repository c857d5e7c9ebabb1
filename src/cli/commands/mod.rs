//! CLI command implementations.

pub mod config;
pub mod plan;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;

use crate::domain::models::WorkflowDefinition;

/// Read and validate a workflow definition file.
pub fn load_workflow(path: &Path) -> Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
    WorkflowDefinition::from_yaml(&content)
        .with_context(|| format!("Invalid workflow in {}", path.display()))
}
