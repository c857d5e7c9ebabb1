//! Cadre CLI entry point.

use clap::Parser;

use cadre::cli::commands;
use cadre::cli::{handle_error, Cli, Commands};
use cadre::infrastructure::config::ConfigLoader;
use cadre::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load_with(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };
    let logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Validate(args) => commands::validate::execute(args, cli.json).await,
        Commands::Plan(args) => commands::plan::execute(args, cli.json).await,
        Commands::Run(args) => commands::run::execute(args, &config, cli.json).await,
        Commands::Config(args) => commands::config::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        // Flush file logs before exiting
        drop(logger);
        handle_error(err, cli.json);
    }
}
