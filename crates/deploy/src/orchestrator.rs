//! Deployment execution engine.
//!
//! Specs run strictly in list order. Each one resolves its constructor
//! arguments against the addresses confirmed so far, is submitted through the
//! [`ChainClient`], and blocks until confirmed before the next one starts. The
//! first failure aborts the rest of the run; confirmed deployments stay in the
//! report since nothing on-chain is rolled back.

use std::collections::HashMap;

use tokio::sync::watch;

use crate::{
    ChainClient, DeployError, DeployRequest, DeployerIdentity, DeploymentResult, DeploymentSpec,
    RunReport, plan::validate_plan,
};

/// Runs an ordered list of [`DeploymentSpec`]s against one chain.
pub struct Orchestrator<'a, C> {
    client: &'a C,
    identity: DeployerIdentity,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, C: ChainClient> Orchestrator<'a, C> {
    pub fn new(client: &'a C, identity: DeployerIdentity) -> Self {
        Self {
            client,
            identity,
            cancel: None,
        }
    }

    /// Stop before the next spec once `true` is sent on the channel.
    ///
    /// A deployment that has already been submitted is always awaited.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|cancel| *cancel.borrow())
    }

    /// Deploy every spec in order and report what was confirmed.
    ///
    /// `specs` must already be in dependency order. The returned report holds
    /// every result confirmed before the first failure, if any.
    pub async fn run(&self, specs: &[DeploymentSpec]) -> RunReport {
        let deployer = self.identity.address();
        let mut report = RunReport::new(deployer);

        // Pre-flight diagnostics, never gating.
        match self.client.chain_id().await {
            Ok(chain_id) => report.chain_id = Some(chain_id),
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "Failed to query chain id"),
        }

        tracing::info!(
            %deployer,
            chain_id = ?report.chain_id,
            "Deploying contracts with the account"
        );

        match self.identity.balance(self.client).await {
            Ok(balance) => tracing::info!(%balance, "Account balance"),
            Err(e) => tracing::warn!(error = %e, "Failed to fetch deployer balance"),
        }

        if let Err((index, error)) = validate_plan(specs) {
            tracing::error!(spec = %specs[index].name, %error, "Invalid deployment plan");
            report.fail(Some(&specs[index].name), error);
            return report;
        }

        let mut deployed: HashMap<String, DeploymentResult> = HashMap::new();

        for spec in specs {
            match self.deploy_spec(spec, &deployed).await {
                Ok(result) => {
                    deployed.insert(spec.name.clone(), result.clone());
                    report.results.push(result);
                }
                Err(error) => {
                    tracing::error!(
                        spec = %spec.name,
                        %error,
                        remaining = specs.len() - report.results.len() - 1,
                        "Deployment failed, aborting run"
                    );
                    report.fail(Some(&spec.name), error);
                    return report;
                }
            }
        }

        tracing::info!(deployed = report.results.len(), "Deployment complete");

        report
    }

    /// Resolve, submit and confirm a single spec.
    async fn deploy_spec(
        &self,
        spec: &DeploymentSpec,
        deployed: &HashMap<String, DeploymentResult>,
    ) -> Result<DeploymentResult, DeployError> {
        if self.is_cancelled() {
            return Err(DeployError::Cancelled);
        }

        let args = spec.resolve_args(deployed)?;
        let contract = spec.contract_name();

        tracing::info!(
            name = %spec.name,
            contract,
            args = ?args,
            "Deploying contract..."
        );

        let pending = self
            .client
            .instantiate(DeployRequest {
                contract,
                args: &args,
                from: self.identity.address(),
            })
            .await
            .map_err(|e| DeployError::submission(&spec.name, e))?;

        tracing::info!(
            name = %spec.name,
            tx_hash = %pending.transaction_hash,
            "Deployment submitted, waiting for confirmation"
        );

        let confirmation = self
            .client
            .await_confirmation(pending)
            .await
            .map_err(|e| DeployError::submission(&spec.name, e))?;

        tracing::info!(
            block = confirmation.block_number,
            "{} deployed to: {}",
            spec.name,
            confirmation.address
        );

        Ok(DeploymentResult {
            name: spec.name.clone(),
            contract: contract.to_string(),
            address: confirmation.address,
            transaction_hash: confirmation.transaction_hash,
            args,
        })
    }
}
