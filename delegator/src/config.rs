use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::chains::{ChainId, ChainRegistry};
use crate::client::{ClientConfig, DEFAULT_TIMEOUT};
use crate::errors::DelegateError;

/// File-backed settings for the transaction service client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Chains and their transaction service roots
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Short name accepted on the command line (e.g., "mainnet")
    pub name: String,
    pub service_url: String,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DelegateError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DelegateError::Config(format!(
                "Failed to read config file {}: {e}",
                path.as_ref().display()
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            DelegateError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// Configuration matching the built-in chain registry
    pub fn default_config() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            chains: ChainRegistry::default()
                .chains()
                .map(|entry| ChainConfig {
                    chain_id: entry.chain_id.0,
                    name: entry.name.clone(),
                    service_url: entry.service_url.as_str().trim_end_matches('/').to_string(),
                })
                .collect(),
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), DelegateError> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            DelegateError::Config(format!("Failed to serialize config to TOML: {e}"))
        })?;

        std::fs::write(path.as_ref(), content).map_err(|e| {
            DelegateError::Config(format!(
                "Failed to write config file {}: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// Builds the chain registry; every URL is validated
    pub fn registry(&self) -> Result<ChainRegistry, DelegateError> {
        let mut registry = ChainRegistry::empty();
        for chain in &self.chains {
            registry.register(ChainId(chain.chain_id), &chain.name, &chain.service_url)?;
        }
        Ok(registry)
    }

    pub fn into_client_config(self) -> Result<ClientConfig, DelegateError> {
        if self.timeout_secs == 0 {
            return Err(DelegateError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(ClientConfig::default()
            .with_registry(self.registry()?)
            .with_timeout(Duration::from_secs(self.timeout_secs)))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default_config();
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.chains.len(), 3);
        assert_eq!(config.registry().unwrap(), ChainRegistry::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("delegator.toml");

        let config = ServiceConfig::default_config();
        config.save_to_file(&path).unwrap();

        let loaded = ServiceConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_parse_custom_chains() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [[chains]]
            chain_id = 31337
            name = "local"
            service_url = "http://127.0.0.1:8000"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout_secs, 15);
        let client_config = config.into_client_config().unwrap();
        assert_eq!(client_config.timeout, Duration::from_secs(15));
        assert_eq!(client_config.registry.find("local"), Some(ChainId(31337)));
        assert!(!client_config.registry.contains(ChainId::MAINNET));
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = ServiceConfig {
            timeout_secs: 5,
            chains: vec![ChainConfig {
                chain_id: 1,
                name: "mainnet".to_string(),
                service_url: "safe-transaction-mainnet".to_string(),
            }],
        };
        assert!(matches!(
            config.into_client_config(),
            Err(DelegateError::Config(_))
        ));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = ServiceConfig {
            timeout_secs: 0,
            ..ServiceConfig::default_config()
        };
        assert!(config.into_client_config().is_err());
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = ServiceConfig::from_file(temp_dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
