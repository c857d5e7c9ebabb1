//! Command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;

use commands::{config::ConfigArgs, plan::PlanArgs, run::RunArgs, validate::ValidateArgs};

#[derive(Parser, Debug)]
#[command(name = "cadre", version, about = "Orchestrate persona-bound agent fleets")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Config file to use instead of .cadre/config.yaml
    #[arg(short, long, global = true, env = "CADRE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check workflow files for schema errors, unknown dependencies and cycles
    Validate(ValidateArgs),
    /// Show the execution waves of a workflow
    Plan(PlanArgs),
    /// Execute a workflow with the configured fleet
    Run(RunArgs),
    /// Inspect configuration
    Config(ConfigArgs),
}

/// Print an error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        eprintln!("{body}");
    } else {
        eprintln!("{} {err}", style("error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  {} {cause}", style("caused by:").dim());
        }
    }
    std::process::exit(1);
}
