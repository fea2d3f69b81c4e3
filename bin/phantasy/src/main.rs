//! phantasy deploys smart contracts in dependency order and reports their addresses.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use phantasy_deploy::DeployConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = DeployConfig::load(&cli.config)?;

    match cli.command {
        Command::Deploy(args) => commands::deploy(&config, args).await,
        Command::Accounts(args) => commands::accounts(&config, args).await,
        Command::Plan => commands::plan(&config),
    }
}
