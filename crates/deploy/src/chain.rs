//! Core chain client trait for phantasy deployments.

use std::future::Future;

use alloy_core::primitives::{Address, TxHash, U256};
use anyhow::Result;

use crate::plan::ArgValue;

/// A request to instantiate one contract.
#[derive(Debug, Clone, Copy)]
pub struct DeployRequest<'a> {
    /// The artifact name of the contract to instantiate.
    pub contract: &'a str,
    /// Resolved constructor arguments, in declaration order.
    pub args: &'a [ArgValue],
    /// The account signing and paying for the deployment.
    pub from: Address,
}

/// Handle to a deployment transaction that has been accepted by the chain
/// client but not yet confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeployment {
    /// The artifact name of the contract being instantiated.
    pub contract: String,
    /// Hash of the deployment transaction.
    pub transaction_hash: TxHash,
}

/// Outcome of a confirmed deployment transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Address of the new contract.
    pub address: Address,
    /// Hash of the deployment transaction.
    pub transaction_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: u64,
}

/// The chain capability consumed by the orchestrator.
///
/// Signing, broadcasting, gas estimation and confirmation policy all live
/// behind this trait. The orchestrator only sequences calls to it.
pub trait ChainClient: Send + Sync {
    /// The chain id of the connected network.
    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Accounts able to sign deployments, in their canonical order.
    fn signers(&self) -> impl Future<Output = Result<Vec<Address>>> + Send;

    /// Current balance of `account`, in wei.
    fn balance(&self, account: Address) -> impl Future<Output = Result<U256>> + Send;

    /// Submit a contract deployment and return without waiting for it to be mined.
    fn instantiate(
        &self,
        request: DeployRequest<'_>,
    ) -> impl Future<Output = Result<PendingDeployment>> + Send;

    /// Block until `pending` is confirmed according to the client's own policy.
    fn await_confirmation(
        &self,
        pending: PendingDeployment,
    ) -> impl Future<Output = Result<Confirmation>> + Send;
}
