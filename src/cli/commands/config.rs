//! `cadre config`: inspect the effective configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the merged configuration (defaults, files, environment)
    Show,
    /// Check the merged configuration
    Check,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput<'a> {
    pub config: &'a Config,
}

impl CommandOutput for ConfigOutput<'_> {
    fn to_human(&self) -> String {
        serde_yaml::to_string(self.config).unwrap_or_default()
    }
}

pub async fn execute(args: ConfigArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        ConfigCommands::Show => output(&ConfigOutput { config }, json_mode),
        ConfigCommands::Check => {
            ConfigLoader::validate(config)?;
            if json_mode {
                println!("{}", serde_json::json!({ "valid": true }));
            } else {
                println!("Configuration is valid ({} agent(s))", config.fleet.total_agents());
            }
        }
    }
    Ok(())
}
