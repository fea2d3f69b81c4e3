//! Deployer identity resolution.

use alloy_core::primitives::{Address, U256};

use crate::{ChainClient, DeployError};

/// The account that signs and pays for deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployerIdentity {
    address: Address,
}

impl DeployerIdentity {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Fetch the current balance of the deployer. Never cached.
    pub async fn balance<C: ChainClient>(&self, client: &C) -> Result<U256, DeployError> {
        client
            .balance(self.address)
            .await
            .map_err(|e| DeployError::ChainUnreachable(format!("{e:#}")))
    }
}

/// Pick the deployer among the chain client's signers.
///
/// Without a preference, the first signer is the deployer. With one, it must
/// be among the signers the client exposes.
pub async fn resolve_identity<C: ChainClient>(
    client: &C,
    preferred: Option<Address>,
) -> Result<DeployerIdentity, DeployError> {
    let signers = client
        .signers()
        .await
        .map_err(|e| DeployError::IdentityUnavailable(format!("{e:#}")))?;

    let address = match preferred {
        Some(address) if signers.contains(&address) => address,
        Some(address) => {
            return Err(DeployError::IdentityUnavailable(format!(
                "account {address} is not managed by the chain client"
            )));
        }
        None => *signers.first().ok_or_else(|| {
            DeployError::IdentityUnavailable("no signing account configured".to_string())
        })?,
    };

    tracing::debug!(%address, signers = signers.len(), "Resolved deployer identity");

    Ok(DeployerIdentity::new(address))
}
