//! [`ChainClient`] over Ethereum JSON-RPC.
//!
//! Without a private key, transactions are sent with `eth_sendTransaction`
//! and signed by the node (a development node, or a node fronted by an
//! external signer), which also picks gas. With one, deployments are signed
//! locally as EIP-155 legacy transactions and sent with
//! `eth_sendRawTransaction`, which is what hosted endpoints accept.

use std::time::Duration;

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Address, Bytes, TxHash, TxKind, U64, U128, U256};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::{Signer, SignerSync};
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;

use crate::{
    ArtifactStore, ChainClient, Confirmation, DeployRequest, NetworkConfig, PendingDeployment,
    plan::encode_constructor_args, rpc::RpcTransport,
};

/// Headroom applied to the node's gas estimate for locally signed deployments, in percent.
const GAS_ESTIMATE_MULTIPLIER: u64 = 130;

/// The subset of a transaction receipt needed to confirm a deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: TxHash,
    block_number: Option<U64>,
    contract_address: Option<Address>,
    status: Option<U64>,
}

/// Deploys contracts through a JSON-RPC node.
#[derive(Debug)]
pub struct RpcChainClient {
    transport: RpcTransport,
    artifacts: ArtifactStore,
    signer: Option<PrivateKeySigner>,
    confirmations: u64,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl RpcChainClient {
    /// Create a client without contacting the node.
    pub fn new(network: &NetworkConfig, artifacts: ArtifactStore) -> Result<Self> {
        if network.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }

        let signer = network
            .private_key
            .as_ref()
            .map(|key| {
                key.expose()
                    .parse::<PrivateKeySigner>()
                    .context("Invalid private key")
            })
            .transpose()?;

        Ok(Self {
            transport: RpcTransport::new(&network.rpc_url)?,
            artifacts,
            signer,
            confirmations: network.confirmations.max(1),
            poll_interval: network.poll_interval(),
            confirmation_timeout: network.confirmation_timeout(),
        })
    }

    /// Create a client and check that the node serves the expected chain.
    pub async fn connect(network: &NetworkConfig, artifacts: ArtifactStore) -> Result<Self> {
        let client = Self::new(network, artifacts)?;

        let chain_id = client
            .chain_id()
            .await
            .with_context(|| format!("Failed to reach {}", client.transport.endpoint()))?;

        if let Some(expected) = network.chain_id {
            if chain_id != expected {
                anyhow::bail!(
                    "Chain id mismatch on {}: expected {}, node reports {}",
                    client.transport.endpoint(),
                    expected,
                    chain_id
                );
            }
        }

        tracing::debug!(endpoint = %client.transport.endpoint(), chain_id, "Connected to chain");

        Ok(client)
    }

    /// Number of polls that fit in the confirmation timeout.
    fn max_polls(&self) -> usize {
        let poll_ms = self.poll_interval.as_millis().max(1);
        (self.confirmation_timeout.as_millis() / poll_ms).max(1) as usize
    }

    /// Sign a contract creation with the local key and broadcast it.
    async fn send_signed(
        &self,
        signer: &PrivateKeySigner,
        from: Address,
        data: Bytes,
    ) -> Result<TxHash> {
        let address = Signer::address(signer);
        if from != address {
            anyhow::bail!(
                "No local key for account {}, the configured key belongs to {}",
                from,
                address
            );
        }

        let chain_id = self.chain_id().await?;
        let nonce: U64 = self
            .transport
            .call(
                "eth_getTransactionCount",
                vec![serde_json::json!(from), serde_json::json!("pending")],
            )
            .await?;
        let gas_price: U128 = self.transport.call("eth_gasPrice", vec![]).await?;
        let gas_estimate: U64 = self
            .transport
            .call(
                "eth_estimateGas",
                vec![serde_json::json!({ "from": from, "data": &data })],
            )
            .await
            .context("Failed to estimate deployment gas")?;

        let tx = TxLegacy {
            chain_id: Some(chain_id),
            nonce: nonce.to::<u64>(),
            gas_price: gas_price.to::<u128>(),
            gas_limit: gas_estimate.to::<u64>() * GAS_ESTIMATE_MULTIPLIER / 100,
            to: TxKind::Create,
            value: U256::ZERO,
            input: data,
        };

        tracing::debug!(
            %from,
            chain_id,
            nonce = tx.nonce,
            gas_limit = tx.gas_limit,
            gas_price = tx.gas_price,
            "Signing deployment transaction"
        );

        let signature = signer
            .sign_hash_sync(&tx.signature_hash())
            .context("Failed to sign deployment transaction")?;
        let raw = TxEnvelope::from(tx.into_signed(signature)).encoded_2718();

        self.transport
            .call(
                "eth_sendRawTransaction",
                vec![serde_json::json!(Bytes::from(raw))],
            )
            .await
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.poll_interval)
            .with_max_times(self.max_polls())
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TransactionReceipt>> {
        self.transport
            .call("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await
    }

    async fn block_number(&self) -> Result<u64> {
        let number: U64 = self.transport.call("eth_blockNumber", vec![]).await?;
        Ok(number.to::<u64>())
    }

    /// Poll until the receipt of `tx_hash` is available.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<TransactionReceipt> {
        (move || async move {
            self.receipt(tx_hash)
                .await?
                .context("Transaction not mined yet")
        })
        .retry(self.backoff())
        .notify(|err: &anyhow::Error, after: Duration| {
            tracing::trace!(%tx_hash, error = %err, ?after, "Waiting for deployment receipt...");
        })
        .await
        .with_context(|| {
            format!(
                "Timeout waiting for transaction {} after {}s",
                tx_hash,
                self.confirmation_timeout.as_secs()
            )
        })
    }

    /// Poll until the chain head reaches `target`.
    async fn wait_for_block(&self, target: u64) -> Result<u64> {
        (move || async move {
            let head = self.block_number().await?;
            if head >= target {
                Ok(head)
            } else {
                anyhow::bail!("Chain head at block {}, waiting for block {}", head, target)
            }
        })
        .retry(self.backoff())
        .notify(|err: &anyhow::Error, after: Duration| {
            tracing::trace!(error = %err, ?after, "Waiting for confirmations...");
        })
        .await
        .context("Timeout waiting for confirmations")
    }
}

impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> Result<u64> {
        let chain_id: U64 = self.transport.call("eth_chainId", vec![]).await?;
        Ok(chain_id.to::<u64>())
    }

    async fn signers(&self) -> Result<Vec<Address>> {
        match &self.signer {
            Some(signer) => Ok(vec![Signer::address(signer)]),
            None => self.transport.call("eth_accounts", vec![]).await,
        }
    }

    async fn balance(&self, account: Address) -> Result<U256> {
        self.transport
            .call(
                "eth_getBalance",
                vec![serde_json::json!(account), serde_json::json!("latest")],
            )
            .await
    }

    async fn instantiate(&self, request: DeployRequest<'_>) -> Result<PendingDeployment> {
        let mut data = self.artifacts.bytecode(request.contract)?.to_vec();
        data.extend(encode_constructor_args(request.args));
        let data = Bytes::from(data);

        let sent = match &self.signer {
            Some(signer) => self.send_signed(signer, request.from, data).await,
            None => {
                self.transport
                    .call(
                        "eth_sendTransaction",
                        vec![serde_json::json!({ "from": request.from, "data": data })],
                    )
                    .await
            }
        };
        let transaction_hash: TxHash =
            sent.with_context(|| format!("Failed to send deployment of {}", request.contract))?;

        Ok(PendingDeployment {
            contract: request.contract.to_string(),
            transaction_hash,
        })
    }

    async fn await_confirmation(&self, pending: PendingDeployment) -> Result<Confirmation> {
        let receipt = self.wait_for_receipt(pending.transaction_hash).await?;

        if receipt.status == Some(U64::ZERO) {
            anyhow::bail!(
                "Deployment of {} reverted in transaction {}",
                pending.contract,
                receipt.transaction_hash
            );
        }

        let address = receipt.contract_address.with_context(|| {
            format!(
                "Receipt of {} has no contract address",
                receipt.transaction_hash
            )
        })?;

        let block_number = receipt
            .block_number
            .context("Receipt has no block number")?
            .to::<u64>();

        if self.confirmations > 1 {
            self.wait_for_block(block_number + self.confirmations - 1)
                .await?;
        }

        Ok(Confirmation {
            address,
            transaction_hash: receipt.transaction_hash,
            block_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(poll_interval_ms: u64, confirmation_timeout_secs: u64) -> RpcChainClient {
        let network = NetworkConfig {
            poll_interval_ms,
            confirmation_timeout_secs,
            ..NetworkConfig::new("http://127.0.0.1:8545")
        };
        RpcChainClient::new(&network, ArtifactStore::new("artifacts")).unwrap()
    }

    #[test]
    fn test_max_polls() {
        assert_eq!(client(1_000, 300).max_polls(), 300);
        assert_eq!(client(500, 10).max_polls(), 20);
        assert_eq!(client(5_000, 1).max_polls(), 1);
    }

    #[test]
    fn test_reject_zero_poll_interval() {
        let network = NetworkConfig {
            poll_interval_ms: 0,
            ..NetworkConfig::new("http://127.0.0.1:8545")
        };
        assert!(RpcChainClient::new(&network, ArtifactStore::new("artifacts")).is_err());
    }

    #[test]
    fn test_reject_invalid_private_key() {
        let network = NetworkConfig {
            private_key: Some(crate::PrivateKey::new("0xnot-a-key")),
            ..NetworkConfig::new("http://127.0.0.1:8545")
        };
        assert!(RpcChainClient::new(&network, ArtifactStore::new("artifacts")).is_err());
    }

    #[test]
    fn test_parse_receipt() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x7c2a7d4bdbb0ce38b1d3f2e3e4b5b0c5e2f3a3a1c1d1e1f1a1b1c1d1e1f1a1b1",
            "blockNumber": "0x1b4",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "status": "0x1",
            "gasUsed": "0x5208"
        }))
        .unwrap();

        assert_eq!(receipt.block_number, Some(U64::from(436)));
        assert_eq!(receipt.status, Some(U64::from(1)));
        assert!(receipt.contract_address.is_some());
    }

    #[test]
    fn test_parse_pending_receipt_fields() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": "0x7c2a7d4bdbb0ce38b1d3f2e3e4b5b0c5e2f3a3a1c1d1e1f1a1b1c1d1e1f1a1b1",
            "blockNumber": null,
            "contractAddress": null
        }))
        .unwrap();

        assert!(receipt.block_number.is_none());
        assert!(receipt.contract_address.is_none());
        assert!(receipt.status.is_none());
    }
}
