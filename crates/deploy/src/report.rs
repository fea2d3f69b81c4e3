//! Deployment results and the report produced at the end of a run.

use std::path::Path;

use alloy_core::primitives::{Address, TxHash};
use anyhow::{Context, Result};
use comfy_table::{Attribute, Cell, Color, Table, presets::ASCII_MARKDOWN};
use serde::{Deserialize, Serialize};

use crate::{DeployError, plan::ArgValue};

/// A confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// Name of the spec that produced this result.
    pub name: String,
    /// Artifact name of the deployed contract.
    pub contract: String,
    /// On-chain address of the contract.
    pub address: Address,
    /// Hash of the deployment transaction.
    pub transaction_hash: TxHash,
    /// Constructor arguments after reference resolution.
    pub args: Vec<ArgValue>,
}

/// The spec a run stopped at, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Name of the offending spec. `None` when the run failed before reaching any spec.
    pub spec: Option<String>,
    /// What went wrong.
    pub error: DeployError,
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Chain the run targeted, if it could be determined.
    pub chain_id: Option<u64>,
    /// Account that signed the deployments.
    pub deployer: Address,
    /// Confirmed deployments, in input order.
    pub results: Vec<DeploymentResult>,
    /// The first failure encountered, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

impl RunReport {
    pub fn new(deployer: Address) -> Self {
        Self {
            chain_id: None,
            deployer,
            results: Vec::new(),
            failure: None,
        }
    }

    /// Mark the run as failed at `spec`.
    pub fn fail(&mut self, spec: Option<&str>, error: DeployError) {
        self.failure = Some(RunFailure {
            spec: spec.map(str::to_string),
            error,
        });
    }

    /// The error the run stopped on, if any.
    pub fn error(&self) -> Option<&DeployError> {
        self.failure.as_ref().map(|failure| &failure.error)
    }

    /// Whether every spec of the run was deployed.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Look up a result by spec name.
    pub fn get(&self, name: &str) -> Option<&DeploymentResult> {
        self.results.iter().find(|result| result.name == name)
    }

    /// Save the report as pretty JSON, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(format!(
                "Failed to create deployments directory {}",
                parent.display()
            ))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        std::fs::write(path, json)
            .context(format!("Failed to write run report to {}", path.display()))?;

        tracing::info!(path = %path.display(), "Run report saved");
        Ok(())
    }

    /// Load a report previously written by [`RunReport::save_to_file`].
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Run report does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read run report from {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse run report JSON")
    }

    /// Render the results as a markdown table.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(ASCII_MARKDOWN);
        table.set_header([
            Cell::new("Name").add_attribute(Attribute::Bold).fg(Color::Blue),
            Cell::new("Contract").add_attribute(Attribute::Bold).fg(Color::Blue),
            Cell::new("Address").add_attribute(Attribute::Bold).fg(Color::Blue),
            Cell::new("Transaction").add_attribute(Attribute::Bold).fg(Color::Blue),
        ]);

        for result in &self.results {
            table.add_row([
                Cell::new(&result.name),
                Cell::new(&result.contract),
                Cell::new(result.address.to_checksum(None)),
                Cell::new(result.transaction_hash.to_string()),
            ]);
        }

        if let Some(failure) = &self.failure {
            table.add_row([
                Cell::new(failure.spec.as_deref().unwrap_or("-")).fg(Color::Red),
                Cell::new("FAILED").fg(Color::Red),
                Cell::new(failure.error.to_string()),
                Cell::new(""),
            ]);
        }

        table
    }
}
