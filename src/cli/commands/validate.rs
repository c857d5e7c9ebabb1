//! `cadre validate`: static checks on workflow files.

use anyhow::{bail, Result};
use clap::Args;
use console::style;
use serde::Serialize;
use std::path::PathBuf;

use super::load_workflow;
use crate::cli::output::{output, CommandOutput};
use crate::services::{DependencyResolver, DependencyScheduler};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Workflow files to check
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    pub workflow: Option<String>,
    pub tasks: usize,
    pub waves: usize,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub files: Vec<FileReport>,
    pub valid: bool,
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        self.files
            .iter()
            .map(|report| match &report.error {
                None => format!(
                    "{} {} ({}): {} task(s) in {} wave(s)",
                    style("ok").green().bold(),
                    report.file,
                    report.workflow.as_deref().unwrap_or("-"),
                    report.tasks,
                    report.waves
                ),
                Some(err) => format!("{} {}: {err}", style("invalid").red().bold(), report.file),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse, register into a scratch scheduler (which rejects unknown
/// dependencies and cycles) and compute waves.
pub fn check(path: &std::path::Path) -> FileReport {
    let mut report = FileReport {
        file: path.display().to_string(),
        workflow: None,
        tasks: 0,
        waves: 0,
        error: None,
    };
    let result = load_workflow(path).and_then(|definition| {
        report.workflow = Some(definition.name.clone());
        let tasks = definition.to_tasks()?;
        report.tasks = tasks.len();
        report.waves = DependencyResolver::new().execution_waves(&tasks)?.len();
        DependencyScheduler::new().register_batch(tasks)?;
        Ok(())
    });
    if let Err(err) = result {
        report.error = Some(format!("{err:#}"));
    }
    report
}

pub async fn execute(args: ValidateArgs, json_mode: bool) -> Result<()> {
    let files: Vec<FileReport> = args.files.iter().map(|path| check(path)).collect();
    let invalid = files.iter().filter(|r| r.error.is_some()).count();
    output(
        &ValidateOutput {
            files,
            valid: invalid == 0,
        },
        json_mode,
    );
    if invalid > 0 {
        bail!("{invalid} workflow file(s) failed validation");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn workflow_file(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_workflow() {
        let file = workflow_file(
            "name: api\ntasks:\n  - key: design\n    title: Design\n    persona: architect\n  - key: build\n    title: Build\n    persona: developer\n    depends_on: [design]\n",
        );
        let report = check(file.path());
        assert!(report.error.is_none(), "{:?}", report.error);
        assert_eq!(report.tasks, 2);
        assert_eq!(report.waves, 2);
    }

    #[test]
    fn test_cycle_is_reported() {
        let file = workflow_file(
            "name: loop\ntasks:\n  - key: a\n    title: A\n    persona: developer\n    depends_on: [b]\n  - key: b\n    title: B\n    persona: developer\n    depends_on: [a]\n",
        );
        let report = check(file.path());
        assert!(report.error.unwrap().to_lowercase().contains("cycle"));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let report = check(std::path::Path::new("/nonexistent/flow.yaml"));
        assert!(report.error.unwrap().contains("Failed to read"));
    }
}
