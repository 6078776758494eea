use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{DEFAULT_ADDRESSES_KEY, DEFAULT_LOG_KEY, DeploymentUnit, Recorder, default_units};

/// The default name of the deployment configuration file.
pub const DEPLOY_CONFIG_FILENAME: &str = "Deploy.toml";

/// Default JSON-RPC endpoint (a local Hardhat or Anvil node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Connection and confirmation settings for the JSON-RPC backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the node.
    pub rpc_url: Url,
    /// Sending account. Defaults to the node's first account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Gas limit for deployment transactions. Left to the node when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Number of blocks, including the inclusion block, a deployment must be buried under.
    pub confirmations: u64,
    /// Delay between receipt polls.
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for a single deployment to confirm.
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("default RPC URL should be valid"),
            from: None,
            gas_limit: None,
            confirmations: 1,
            poll_interval_ms: 1_000,
            timeout_secs: 300,
        }
    }
}

/// Everything needed to run a deployment.
///
/// This struct can be serialized to/from TOML format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Node connection settings.
    pub network: NetworkConfig,
    /// Hardhat artifacts directory.
    pub artifacts_dir: PathBuf,
    /// Directory the address file and deployment log are written to.
    pub output_dir: PathBuf,
    /// File name of the address map inside `output_dir`.
    pub addresses_key: String,
    /// File name of the deployment log inside `output_dir`. Empty disables the log.
    pub log_key: String,
    /// Units to deploy.
    #[serde(rename = "unit")]
    pub units: Vec<DeploymentUnit>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            artifacts_dir: PathBuf::from("artifacts"),
            output_dir: PathBuf::from("../frontend/src/contracts"),
            addresses_key: DEFAULT_ADDRESSES_KEY.to_string(),
            log_key: DEFAULT_LOG_KEY.to_string(),
            units: default_units(),
        }
    }
}

impl DeployConfig {
    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deploy config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, or from `Deploy.toml` inside a directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Configuration file or directory not found: {}", path.display());
        }

        let config_path = if path.is_dir() {
            path.join(DEPLOY_CONFIG_FILENAME)
        } else {
            path.to_path_buf()
        };

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Units with every placeholder target added to their dependencies.
    pub fn units(&self) -> Vec<DeploymentUnit> {
        self.units.iter().cloned().map(DeploymentUnit::normalized).collect()
    }

    /// Recorder writing to the configured keys.
    pub fn recorder(&self) -> Recorder {
        let log_key = Some(self.log_key.clone()).filter(|key| !key.is_empty());
        Recorder::new(self.addresses_key.clone(), log_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConstructorArg;
    use tempdir::TempDir;

    #[test]
    fn test_defaults_match_two_contract_deployment() {
        let config = DeployConfig::default();
        assert_eq!(config.network.rpc_url.as_str(), "http://127.0.0.1:8545/");
        assert_eq!(config.output_dir, PathBuf::from("../frontend/src/contracts"));
        assert_eq!(config.addresses_key, "addresses.json");
        assert_eq!(config.units.len(), 2);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new("chainseq-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join(DEPLOY_CONFIG_FILENAME);

        let mut config = DeployConfig::default();
        config.network.confirmations = 3;
        config.network.gas_limit = Some(6_000_000);

        config.save_to_file(&path).expect("Failed to save config");
        let loaded = DeployConfig::load_from_file(temp_dir.path()).expect("Failed to load config");

        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new("chainseq-test").expect("Failed to create temp dir");
        assert!(DeployConfig::load_from_file(&temp_dir.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new("chainseq-test").expect("Failed to create temp dir");
        let path = temp_dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
            output_dir = "out"
            log_key = ""

            [network]
            rpc_url = "http://localhost:9545"

            [[unit]]
            name = "Token"

            [[unit]]
            name = "Vault"
            constructor = [{ address_of = "Token" }]
            "#,
        )
        .unwrap();

        let config = DeployConfig::load_from_file(&path).unwrap();
        assert_eq!(config.network.rpc_url.as_str(), "http://localhost:9545/");
        assert_eq!(config.network.confirmations, 1);
        assert_eq!(config.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(config.recorder().log_key(), None);

        let units = config.units();
        assert_eq!(units[1].name, "Vault");
        assert!(units[1].dependencies.contains("Token"));
        assert_eq!(
            units[1].constructor_template,
            vec![ConstructorArg::AddressOf("Token".to_string())]
        );
    }
}
