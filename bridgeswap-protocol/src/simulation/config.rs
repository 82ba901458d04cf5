use crate::config::ConfigError;
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Basis-point denominator used for bridge fees and slippage tolerances
pub const BPS_DENOMINATOR: u32 = 10_000;

/// How a token on one network is represented on another.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRoute {
    pub src_chain_id: u64,
    pub src_token: Address,
    pub dst_chain_id: u64,
    pub dst_token: Address,
}

// Configuration of the simulated relaying side of the bridge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerConfig {
    // Haircut the bridge takes from every delivery
    pub bridge_fee_bps: u32,
    // Tokens without a route arrive under the same address
    #[serde(default)]
    pub token_routes: Vec<TokenRoute>,
    // Blocks mined on the destination after each delivery
    #[serde(default = "default_blocks_per_delivery")]
    pub blocks_per_delivery: u64,
}

fn default_blocks_per_delivery() -> u64 {
    1
}

impl Default for RelayerConfig {
    fn default() -> Self {
        RelayerConfig {
            bridge_fee_bps: 5,
            token_routes: Vec::new(),
            blocks_per_delivery: default_blocks_per_delivery(),
        }
    }
}

impl RelayerConfig {
    pub fn with_bridge_fee_bps(mut self, bps: u32) -> Self {
        self.bridge_fee_bps = bps;
        self
    }

    pub fn with_token_route(mut self, route: TokenRoute) -> Self {
        self.token_routes.push(route);
        self
    }

    pub fn destination_token(&self, src_chain_id: u64, src_token: Address, dst_chain_id: u64) -> Address {
        self.token_routes
            .iter()
            .find(|r| r.src_chain_id == src_chain_id && r.src_token == src_token && r.dst_chain_id == dst_chain_id)
            .map(|r| r.dst_token)
            .unwrap_or(src_token)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: RelayerConfig = serde_json::from_str(&contents)?;
        if config.bridge_fee_bps > BPS_DENOMINATOR {
            return Err(ConfigError::Invalid(format!(
                "bridge fee of {} bps exceeds 100%",
                config.bridge_fee_bps
            )));
        }
        Ok(config)
    }
}
