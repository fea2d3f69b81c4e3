//! phantasy-deploy - Contract deployment library.
//!
//! This crate sequences smart contract deployments through a [`ChainClient`]:
//! each [`DeploymentSpec`] is resolved against the addresses produced by the
//! specs before it, submitted, confirmed, and recorded in a [`RunReport`].
//!
//! # Example
//!
//! ```no_run
//! use phantasy_deploy::{
//!     ArtifactStore, ConstructorArg, DeploymentSpec, NetworkConfig, Orchestrator, RpcChainClient,
//!     resolve_identity,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let network = NetworkConfig::new("http://127.0.0.1:8545");
//! let client = RpcChainClient::connect(&network, ArtifactStore::new("artifacts")).await?;
//! let identity = resolve_identity(&client, None).await?;
//!
//! let specs = vec![
//!     DeploymentSpec::new("Factory").contract("PhantasySwapFactoryV01"),
//!     DeploymentSpec::new("Router")
//!         .contract("PhantasySwapRouterV01")
//!         .arg(ConstructorArg::reference("Factory")),
//! ];
//!
//! let report = Orchestrator::new(&client, identity).run(&specs).await;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

mod artifact;
pub use artifact::ArtifactStore;

mod chain;
pub use chain::{ChainClient, Confirmation, DeployRequest, PendingDeployment};

mod client;
pub use client::RpcChainClient;

mod config;
pub use config::{DEPLOY_CONFIG_FILENAME, DeployConfig, ENV_PREFIX, NetworkConfig, PrivateKey};

mod error;
pub use error::DeployError;

mod identity;
pub use identity::{DeployerIdentity, resolve_identity};

mod orchestrator;
pub use orchestrator::Orchestrator;

pub mod plan;
pub use plan::{ArgValue, ConstructorArg, DeploymentSpec, validate_plan};

mod report;
pub use report::{DeploymentResult, RunFailure, RunReport};

mod rpc;

/// Re-exported chain primitives used in the public API.
pub use alloy_core::primitives::{Address, TxHash, U256};
