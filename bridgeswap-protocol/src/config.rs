use crate::authorization::DEFAULT_FEE_DOMAIN_TAG;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-network settings of one orchestrator deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    pub chain_id: u64,
    // Account that holds funds while a call is in progress
    pub orchestrator: Address,
    pub wrapped_native: Address,
    // Only signer whose fee claims are honoured
    pub fee_authorizer: Address,
    // Destination-side fees go here; None keeps them with the orchestrator
    #[serde(default)]
    pub fee_collector: Option<Address>,
    #[serde(default = "default_fee_domain_tag")]
    pub fee_domain_tag: String,
}

fn default_fee_domain_tag() -> String {
    DEFAULT_FEE_DOMAIN_TAG.to_string()
}

impl RouterConfig {
    pub fn new(chain_id: u64, orchestrator: Address, wrapped_native: Address, fee_authorizer: Address) -> Self {
        RouterConfig {
            chain_id,
            orchestrator,
            wrapped_native,
            fee_authorizer,
            fee_collector: None,
            fee_domain_tag: default_fee_domain_tag(),
        }
    }

    pub fn with_fee_collector(mut self, collector: Address) -> Self {
        self.fee_collector = Some(collector);
        self
    }

    pub fn fee_recipient(&self) -> Address {
        self.fee_collector.unwrap_or(self.orchestrator)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RouterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        log::debug!("[Config] Loaded router config from {}", path.as_ref().display());
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.orchestrator.is_zero() {
            return Err(ConfigError::Invalid("orchestrator address is zero".to_string()));
        }
        if self.wrapped_native.is_zero() {
            return Err(ConfigError::Invalid("wrapped native token is zero".to_string()));
        }
        if self.fee_authorizer.is_zero() {
            return Err(ConfigError::Invalid("fee authorizer is zero".to_string()));
        }
        if self.fee_domain_tag.is_empty() {
            return Err(ConfigError::Invalid("fee domain tag is empty".to_string()));
        }
        Ok(())
    }
}
