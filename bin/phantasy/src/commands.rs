//! Subcommand handlers.

use std::collections::HashSet;

use anyhow::{Context, Result};
use phantasy_deploy::{
    ArtifactStore, ChainClient, DeployConfig, Orchestrator, RpcChainClient, RunReport,
    resolve_identity, validate_plan,
};
use tokio::sync::watch;

use crate::cli::{AccountsArgs, DeployArgs, OutputFormat};

/// Deploy the plan to every selected network, one independent run per network.
pub async fn deploy(config: &DeployConfig, args: DeployArgs) -> Result<()> {
    let networks = select_networks(config, &args.networks)?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancel_tx).await {
            tracing::error!("Ctrl+C received again, exiting without waiting for pending deployments");
            std::process::exit(130);
        }
    });

    let runs = networks
        .iter()
        .map(|name| deploy_network(config, name, cancel_rx.clone()));
    let outcomes = futures::future::join_all(runs).await;

    let mut failed = Vec::new();
    for (name, outcome) in networks.iter().zip(outcomes) {
        let succeeded = match outcome {
            Ok(report) => record_report(config, name, &report, &args),
            Err(e) => {
                tracing::error!(network = %name, error = %format!("{e:#}"), "Deployment run failed");
                false
            }
        };
        if !succeeded {
            failed.push(name.as_str());
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("Deployment failed on: {}", failed.join(", "));
    }

    Ok(())
}

/// Resolve the requested networks, or the default one. Each network runs once.
fn select_networks(config: &DeployConfig, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(vec![config.network(None)?.0]);
    }

    let mut seen = HashSet::new();
    let mut networks = Vec::new();
    for name in requested {
        let (name, _) = config.network(Some(name))?;
        if seen.insert(name.clone()) {
            networks.push(name);
        }
    }

    Ok(networks)
}

/// Forward the first interrupt to `cancel`.
///
/// Returns `true` when a second interrupt asks to exit right away.
async fn watch_interrupts<S, F>(mut interrupt: S, cancel: watch::Sender<bool>) -> bool
where
    S: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    if interrupt().await.is_err() {
        return false;
    }

    tracing::warn!(
        "Ctrl+C received, stopping after the current deployment. Press Ctrl+C again to exit now"
    );
    let _ = cancel.send(true);

    interrupt().await.is_ok()
}

async fn deploy_network(
    config: &DeployConfig,
    name: &str,
    cancel: watch::Receiver<bool>,
) -> Result<RunReport> {
    let (name, network) = config.network(Some(name))?;

    let client = RpcChainClient::connect(network, ArtifactStore::new(&config.artifacts))
        .await
        .with_context(|| format!("Failed to connect to network `{name}`"))?;
    let identity = resolve_identity(&client, network.from).await?;

    tracing::info!(network = %name, "Starting deployment run...");

    Ok(Orchestrator::new(&client, identity)
        .with_cancellation(cancel)
        .run(&config.contracts)
        .await)
}

/// Print a run report, then save it unless disabled.
///
/// Returns whether the run succeeded and its report was saved.
fn record_report(config: &DeployConfig, network: &str, report: &RunReport, args: &DeployArgs) -> bool {
    if let Err(e) = print_report(network, report, args.format) {
        tracing::warn!(network, error = %format!("{e:#}"), "Failed to print run report");
    }

    if !args.no_save {
        if let Err(e) = report.save_to_file(&config.deployments_path(network)) {
            tracing::error!(network, error = %format!("{e:#}"), "Failed to save run report");
            return false;
        }
    }

    report.is_success()
}

fn print_report(network: &str, report: &RunReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!("\n{network}\n");
            println!("{}", report.to_table());
        }
        OutputFormat::Json => {
            let json = serde_json::json!({ "network": network, "report": report });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}

/// List the node's signer accounts with their balances.
pub async fn accounts(config: &DeployConfig, args: AccountsArgs) -> Result<()> {
    let (name, network) = config.network(args.network.as_deref())?;

    let client = RpcChainClient::connect(network, ArtifactStore::new(&config.artifacts))
        .await
        .with_context(|| format!("Failed to connect to network `{name}`"))?;
    let signers = client
        .signers()
        .await
        .context("Failed to list signer accounts")?;

    if signers.is_empty() {
        println!(
            "No signer accounts available on {name}. Hosted endpoints need a private_key for the network"
        );
        return Ok(());
    }

    for address in signers {
        match client.balance(address).await {
            Ok(balance) => println!("{address}  {balance} wei"),
            Err(e) => {
                tracing::warn!(%address, error = %format!("{e:#}"), "Failed to query balance");
                println!("{address}  balance unavailable");
            }
        }
    }

    Ok(())
}

/// Check the deployment plan and print it in execution order.
pub fn plan(config: &DeployConfig) -> Result<()> {
    if let Err((index, err)) = validate_plan(&config.contracts) {
        anyhow::bail!(
            "Invalid deployment plan at `{}`: {}",
            config.contracts[index].name,
            err
        );
    }

    for (index, spec) in config.contracts.iter().enumerate() {
        let dependencies = spec.dependencies().collect::<Vec<_>>();
        if dependencies.is_empty() {
            println!("{}. {} ({})", index + 1, spec.name, spec.contract_name());
        } else {
            println!(
                "{}. {} ({}) <- {}",
                index + 1,
                spec.name,
                spec.contract_name(),
                dependencies.join(", ")
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, path::PathBuf};

    use phantasy_deploy::{Address, NetworkConfig};
    use tempdir::TempDir;

    use super::*;

    fn config(deployments_dir: PathBuf) -> DeployConfig {
        let networks = ["goerli", "localhost"]
            .into_iter()
            .map(|name| (name.to_string(), NetworkConfig::new("http://127.0.0.1:8545")))
            .collect::<BTreeMap<_, _>>();

        DeployConfig {
            default_network: Some("localhost".to_string()),
            artifacts: PathBuf::from("artifacts"),
            deployments_dir,
            networks,
            contracts: Vec::new(),
        }
    }

    fn deploy_args(no_save: bool) -> DeployArgs {
        DeployArgs {
            networks: Vec::new(),
            no_save,
            format: OutputFormat::Table,
        }
    }

    #[test]
    fn test_select_networks() {
        let config = config(PathBuf::from("deployments"));

        assert_eq!(select_networks(&config, &[]).unwrap(), vec!["localhost"]);

        let requested = ["goerli", "goerli", "localhost"].map(String::from);
        assert_eq!(
            select_networks(&config, &requested).unwrap(),
            vec!["goerli", "localhost"]
        );

        assert!(select_networks(&config, &["mainnet".to_string()]).is_err());
    }

    #[test]
    fn test_record_report_saves() {
        let temp_dir = TempDir::new("phantasy-record").unwrap();
        let config = config(temp_dir.path().join("deployments"));
        let report = RunReport::new(Address::repeat_byte(0xaa));

        assert!(record_report(&config, "localhost", &report, &deploy_args(false)));
        assert!(config.deployments_path("localhost").exists());
    }

    #[test]
    fn test_record_report_save_failure() {
        let temp_dir = TempDir::new("phantasy-record").unwrap();
        let blocker = temp_dir.path().join("not-a-directory");
        std::fs::write(&blocker, "").unwrap();
        let config = config(blocker);
        let report = RunReport::new(Address::repeat_byte(0xaa));

        assert!(!record_report(&config, "localhost", &report, &deploy_args(false)));
        assert!(record_report(&config, "localhost", &report, &deploy_args(true)));
    }

    fn interrupts(
        results: Vec<std::io::Result<()>>,
    ) -> impl FnMut() -> std::future::Ready<std::io::Result<()>> {
        let mut results = results.into_iter();
        move || std::future::ready(results.next().unwrap_or(Ok(())))
    }

    #[tokio::test]
    async fn test_second_interrupt_forces_exit() {
        let (cancel_tx, cancel_rx) = watch::channel(false);

        assert!(watch_interrupts(interrupts(vec![Ok(()), Ok(())]), cancel_tx).await);
        assert!(*cancel_rx.borrow());
    }

    #[tokio::test]
    async fn test_single_interrupt_only_cancels() {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let signals = interrupts(vec![Ok(()), Err(std::io::Error::other("signal stream closed"))]);

        assert!(!watch_interrupts(signals, cancel_tx).await);
        assert!(*cancel_rx.borrow());
    }

    #[tokio::test]
    async fn test_no_signal_handler() {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let signals = interrupts(vec![Err(std::io::Error::other("no signal handler"))]);

        assert!(!watch_interrupts(signals, cancel_tx).await);
        assert!(!*cancel_rx.borrow());
    }
}
