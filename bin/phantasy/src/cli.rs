use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use phantasy_deploy::DEPLOY_CONFIG_FILENAME;
use tracing::level_filters::LevelFilter;

/// How run reports are printed on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "phantasy")]
#[command(
    author,
    version,
    about = "Deploy smart contracts in dependency order and report their addresses"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "PHANTASY_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the deployment configuration file, or to a directory containing a Deploy.toml.
    #[arg(short, long, global = true, alias = "conf", env = "PHANTASY_CONFIG", default_value = DEPLOY_CONFIG_FILENAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy the configured contracts.
    Deploy(DeployArgs),
    /// List the accounts able to sign deployments, with their balances.
    Accounts(AccountsArgs),
    /// Check the deployment plan without touching any chain.
    Plan,
}

#[derive(Args)]
pub struct DeployArgs {
    /// The networks to deploy to.
    ///
    /// Each network gets its own independent run; runs execute concurrently.
    /// If not provided, the configured default network is used.
    #[arg(short, long = "network", env = "PHANTASY_NETWORK", value_delimiter = ',')]
    pub networks: Vec<String>,

    /// Do not write the run report to the deployments directory.
    #[arg(long, env = "PHANTASY_NO_SAVE")]
    pub no_save: bool,

    /// The format used to print run reports.
    #[arg(long, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct AccountsArgs {
    /// The network to query. Defaults to the configured default network.
    #[arg(short, long, env = "PHANTASY_NETWORK")]
    pub network: Option<String>,
}
