//! Deployment configuration.
//!
//! A `Deploy.toml` file lists the target networks and the ordered deployment
//! plan. Any value can be overridden from the environment with the
//! `PHANTASY_` prefix and `__` as the nesting separator, e.g.
//! `PHANTASY_NETWORKS__GOERLI__RPC_URL`.
//!
//! Hosted endpoints do not sign transactions. Networks served by one need a
//! `private_key`, best provided through the environment
//! (`PHANTASY_NETWORKS__GOERLI__PRIVATE_KEY`) rather than the file.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};

use crate::DeploymentSpec;

/// The default name of the deployment configuration file.
pub const DEPLOY_CONFIG_FILENAME: &str = "Deploy.toml";

/// Prefix of environment variables overriding the configuration file.
pub const ENV_PREFIX: &str = "PHANTASY_";

const DEFAULT_CONFIRMATIONS: u64 = 1;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 300;

fn default_confirmations() -> u64 {
    DEFAULT_CONFIRMATIONS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_confirmation_timeout_secs() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

fn default_artifacts() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_deployments_dir() -> PathBuf {
    PathBuf::from("deployments")
}

/// A hex-encoded secp256k1 private key. Redacted from debug output.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Connection settings for one target network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint. May embed an API key.
    pub rpc_url: String,
    /// Expected chain id. Checked on connect when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Deployer account. Defaults to the first account of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Sign deployments locally with this key instead of through the node.
    #[serde(default, skip_serializing)]
    pub private_key: Option<PrivateKey>,
    /// Number of blocks a deployment must be buried under, including its own.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Delay between two receipt polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Give up waiting for a deployment after this many seconds.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
}

impl NetworkConfig {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id: None,
            from: None,
            private_key: None,
            confirmations: DEFAULT_CONFIRMATIONS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

/// The full deployment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Network used when none is selected explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_network: Option<String>,
    /// Directory holding the compiled contract artifacts.
    #[serde(default = "default_artifacts")]
    pub artifacts: PathBuf,
    /// Directory run reports are written to, one file per network.
    #[serde(default = "default_deployments_dir")]
    pub deployments_dir: PathBuf,
    /// Target networks by name.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
    /// The deployment plan, in dependency order.
    #[serde(default)]
    pub contracts: Vec<DeploymentSpec>,
}

impl DeployConfig {
    /// Layer the configuration file under the `PHANTASY_` environment.
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration from a file or a directory containing
    /// [`DEPLOY_CONFIG_FILENAME`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Configuration file or directory not found: {}", path.display());
        }

        let config_path = if path.is_dir() {
            path.join(DEPLOY_CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let config = Self::from_figment(Self::figment(&config_path))
            .context(format!("Failed to load config from {}", config_path.display()))?;

        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .context("Failed to parse deployment configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, network) in &self.networks {
            if network.poll_interval_ms == 0 {
                anyhow::bail!("Network `{}`: poll_interval_ms must be greater than 0", name);
            }
            if network.confirmation_timeout_secs == 0 {
                anyhow::bail!(
                    "Network `{}`: confirmation_timeout_secs must be greater than 0",
                    name
                );
            }
        }

        Ok(())
    }

    /// Look up a network, falling back to `default_network`, then to the
    /// only configured network.
    pub fn network(&self, name: Option<&str>) -> Result<(String, &NetworkConfig)> {
        let name = match name.or(self.default_network.as_deref()) {
            Some(name) => name.to_string(),
            None if self.networks.len() == 1 => {
                self.networks.keys().next().cloned().unwrap_or_default()
            }
            None => anyhow::bail!(
                "No network selected and no default_network configured. Available: {:?}",
                self.networks.keys().collect::<Vec<_>>()
            ),
        };

        let network = self.networks.get(&name).with_context(|| {
            format!(
                "Unknown network `{}`. Available: {:?}",
                name,
                self.networks.keys().collect::<Vec<_>>()
            )
        })?;

        Ok((name, network))
    }

    /// Where the run report for `network` is written.
    pub fn deployments_path(&self, network: &str) -> PathBuf {
        self.deployments_dir.join(format!("{network}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArgValue, ConstructorArg};
    use tempdir::TempDir;

    const SAMPLE: &str = r#"
        default_network = "bsctest"

        [networks.goerli]
        rpc_url = "https://eth-goerli.alchemyapi.io/v2/key"
        chain_id = 5

        [networks.bsctest]
        rpc_url = "https://bsc-testnet.example/key"
        from = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
        confirmations = 3

        [[contracts]]
        name = "Factory"
        contract = "PhantasySwapFactoryV01"
        args = [{ address = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8" }]

        [[contracts]]
        name = "Router"
        contract = "PhantasySwapRouterV01"
        args = [{ ref = "Factory" }]
    "#;

    fn sample() -> DeployConfig {
        DeployConfig::from_figment(Figment::from(Toml::string(SAMPLE))).unwrap()
    }

    #[test]
    fn test_parse_config() {
        let config = sample();

        assert_eq!(config.artifacts, PathBuf::from("artifacts"));
        assert_eq!(config.networks.len(), 2);
        assert_eq!(config.contracts.len(), 2);
        assert!(matches!(
            config.contracts[0].args[0],
            ConstructorArg::Literal(ArgValue::Address(_))
        ));
        assert_eq!(config.contracts[1].args, vec![ConstructorArg::reference("Factory")]);

        let goerli = &config.networks["goerli"];
        assert_eq!(goerli.chain_id, Some(5));
        assert_eq!(goerli.confirmations, DEFAULT_CONFIRMATIONS);
        assert_eq!(goerli.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_network_selection() {
        let config = sample();

        let (name, network) = config.network(None).unwrap();
        assert_eq!(name, "bsctest");
        assert_eq!(network.confirmations, 3);
        assert!(network.from.is_some());

        let (name, _) = config.network(Some("goerli")).unwrap();
        assert_eq!(name, "goerli");

        assert!(config.network(Some("mainnet")).is_err());
    }

    #[test]
    fn test_single_network_is_implicit_default() {
        let config = DeployConfig::from_figment(Figment::from(Toml::string(
            r#"
            [networks.localhost]
            rpc_url = "http://127.0.0.1:8545"
            "#,
        )))
        .unwrap();

        let (name, network) = config.network(None).unwrap();
        assert_eq!(name, "localhost");
        assert_eq!(network, &NetworkConfig::new("http://127.0.0.1:8545"));
        assert_eq!(
            config.deployments_path(&name),
            PathBuf::from("deployments/localhost.json")
        );
    }

    #[test]
    fn test_integer_constructor_literal() {
        let config = DeployConfig::from_figment(Figment::from(Toml::string(
            r#"
            [[contracts]]
            name = "Elixir"
            args = [{ uint = 1000 }, { uint = "0x3e8" }]
            "#,
        )))
        .unwrap();

        assert_eq!(
            config.contracts[0].args,
            vec![
                ConstructorArg::Literal(ArgValue::Uint(alloy_core::primitives::U256::from(1000))),
                ConstructorArg::Literal(ArgValue::Uint(alloy_core::primitives::U256::from(1000))),
            ]
        );
    }

    #[test]
    fn test_reject_zero_poll_interval() {
        let err = DeployConfig::from_figment(Figment::from(Toml::string(
            r#"
            [networks.localhost]
            rpc_url = "http://127.0.0.1:8545"
            poll_interval_ms = 0
            "#,
        )))
        .unwrap_err();

        assert!(err.to_string().contains("poll_interval_ms"), "{err:#}");
    }

    #[test]
    fn test_private_key_is_redacted() {
        let config = DeployConfig::from_figment(Figment::from(Toml::string(
            r#"
            [networks.goerli]
            rpc_url = "https://eth-goerli.alchemyapi.io/v2/key"
            private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
            "#,
        )))
        .unwrap();

        let network = &config.networks["goerli"];
        assert!(network.private_key.is_some());
        assert!(!format!("{network:?}").contains("ac0974"));
    }

    #[test]
    fn test_load_from_directory() {
        let temp_dir = TempDir::new("phantasy-config").unwrap();
        std::fs::write(temp_dir.path().join(DEPLOY_CONFIG_FILENAME), SAMPLE).unwrap();

        let config = DeployConfig::load(temp_dir.path()).unwrap();
        assert_eq!(config.contracts[0].name, "Factory");

        assert!(DeployConfig::load(&temp_dir.path().join("missing.toml")).is_err());
    }
}
