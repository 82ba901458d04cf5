// Simulated relaying side of the bridge: carries queued messages to the
// destination network and invokes the success or fallback callback there.

use crate::cross_chain::types::{Completion, RouterError};
use crate::data_structures::mul_div;
use crate::onchain::interface::BridgeMessage;
use crate::simulation::config::{RelayerConfig, BPS_DENOMINATOR};
use crate::simulation::{RouterNode, SharedNode};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;

/// What the relayer hands to the destination for one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub token: Address,
    pub amount: U256,
    // False when the bridge haircut exceeds the sender's slippage tolerance
    pub within_tolerance: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Received(Completion),
    Fallback { completion: Completion, reason: String },
    Undeliverable { transfer_id: u64, error: String },
}

impl DeliveryOutcome {
    pub fn completion(&self) -> Option<&Completion> {
        match self {
            DeliveryOutcome::Received(completion) => Some(completion),
            DeliveryOutcome::Fallback { completion, .. } => Some(completion),
            DeliveryOutcome::Undeliverable { .. } => None,
        }
    }
}

/// Destination side of a relay hop.
#[async_trait]
pub trait DeliveryEndpoint: Send + Sync {
    fn chain_id(&self) -> u64;

    async fn deliver(&self, message: &BridgeMessage, delivery: &Delivery) -> Result<DeliveryOutcome, RouterError>;
}

/// Delivers into an in-process [`RouterNode`].
pub struct NodeEndpoint {
    chain_id: u64,
    node: SharedNode,
    blocks_per_delivery: u64,
}

impl NodeEndpoint {
    pub fn new(chain_id: u64, node: SharedNode, blocks_per_delivery: u64) -> Self {
        NodeEndpoint { chain_id, node, blocks_per_delivery }
    }
}

#[async_trait]
impl DeliveryEndpoint for NodeEndpoint {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn deliver(&self, message: &BridgeMessage, delivery: &Delivery) -> Result<DeliveryOutcome, RouterError> {
        let mut guard = self.node.lock().await;
        let node: &mut RouterNode = &mut guard;

        // Funds are credited whichever callback runs
        node.chain
            .state_mut()
            .mint(delivery.token, message.dst_address, delivery.amount)?;

        let reason = if delivery.within_tolerance {
            match node
                .orchestrator
                .on_transfer_received(&mut node.chain, delivery.token, delivery.amount, &message.payload)
            {
                Ok(completion) => {
                    node.mine(self.blocks_per_delivery);
                    return Ok(DeliveryOutcome::Received(completion));
                }
                Err(e) => e.to_string(),
            }
        } else {
            format!(
                "bridge slippage exceeds tolerance of {} bps",
                message.max_slippage_bps
            )
        };

        log::info!(
            "[Relayer] Transfer {} to chain {} falls back: {}",
            message.transfer_id,
            self.chain_id,
            reason
        );
        let completion = match node
            .orchestrator
            .on_transfer_failed(&mut node.chain, delivery.token, delivery.amount, &message.payload)
        {
            Ok(completion) => completion,
            Err(e) => {
                // Neither callback accepted the funds, so the credit is withdrawn
                node.chain
                    .state_mut()
                    .burn(delivery.token, message.dst_address, delivery.amount)?;
                return Err(e);
            }
        };
        node.mine(self.blocks_per_delivery);
        Ok(DeliveryOutcome::Fallback { completion, reason })
    }
}

pub struct Relayer {
    config: RelayerConfig,
    endpoints: HashMap<u64, Arc<dyn DeliveryEndpoint>>,
}

impl Relayer {
    pub fn new(config: RelayerConfig) -> Self {
        Relayer {
            config,
            endpoints: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RelayerConfig {
        &self.config
    }

    pub fn register_endpoint(&mut self, endpoint: Arc<dyn DeliveryEndpoint>) {
        log::debug!("[Relayer] Registered endpoint for chain {}", endpoint.chain_id());
        self.endpoints.insert(endpoint.chain_id(), endpoint);
    }

    pub fn register_node(&mut self, chain_id: u64, node: SharedNode) {
        let blocks = self.config.blocks_per_delivery;
        self.register_endpoint(Arc::new(NodeEndpoint::new(chain_id, node, blocks)));
    }

    /// Applies the bridge haircut and token mapping to a message.
    pub fn quote_delivery(&self, message: &BridgeMessage) -> Delivery {
        let haircut = mul_div(
            message.amount,
            U256::from(self.config.bridge_fee_bps),
            U256::from(BPS_DENOMINATOR),
        )
        .unwrap_or_default();
        Delivery {
            token: self
                .config
                .destination_token(message.src_chain_id, message.token, message.dst_chain_id),
            amount: message.amount.saturating_sub(haircut),
            within_tolerance: self.config.bridge_fee_bps <= message.max_slippage_bps,
        }
    }

    pub async fn relay(&self, message: BridgeMessage) -> DeliveryOutcome {
        let Some(endpoint) = self.endpoints.get(&message.dst_chain_id) else {
            log::error!(
                "[Relayer] No endpoint for chain {} (transfer {})",
                message.dst_chain_id,
                message.transfer_id
            );
            return DeliveryOutcome::Undeliverable {
                transfer_id: message.transfer_id,
                error: format!("no endpoint for chain {}", message.dst_chain_id),
            };
        };

        let delivery = self.quote_delivery(&message);
        log::debug!(
            "[Relayer] Delivering transfer {} ({} -> {}): {} of {:?}",
            message.transfer_id,
            message.src_chain_id,
            message.dst_chain_id,
            delivery.amount,
            delivery.token
        );
        match endpoint.deliver(&message, &delivery).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("[Relayer] Transfer {} could not be delivered: {}", message.transfer_id, e);
                DeliveryOutcome::Undeliverable {
                    transfer_id: message.transfer_id,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Relays a batch concurrently. Messages for the same destination are
    /// serialized by that node's lock.
    pub async fn relay_all(&self, messages: Vec<BridgeMessage>) -> Vec<DeliveryOutcome> {
        join_all(messages.into_iter().map(|message| self.relay(message))).await
    }

    /// Drains the outbox of `source` and relays everything found there.
    pub async fn pump(&self, source: &SharedNode) -> Vec<DeliveryOutcome> {
        let messages = {
            let mut node = source.lock().await;
            node.chain.drain_outbox()
        };
        if messages.is_empty() {
            return Vec::new();
        }
        log::info!("[Relayer] Relaying {} message(s)", messages.len());
        self.relay_all(messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain::interface::BridgeSelector;
    use ethers::types::Bytes;

    fn message(amount: u64, max_slippage_bps: u32) -> BridgeMessage {
        BridgeMessage {
            transfer_id: 1,
            src_chain_id: 1,
            dst_chain_id: 2,
            dst_address: Address::repeat_byte(0x0C),
            token: Address::repeat_byte(0xA0),
            amount: U256::from(amount),
            max_slippage_bps,
            payload: Bytes::default(),
            bridge: BridgeSelector(1),
            fee_budget: U256::zero(),
        }
    }

    #[test]
    fn quote_applies_haircut_and_tolerance() {
        let relayer = Relayer::new(RelayerConfig::default().with_bridge_fee_bps(30));

        let within = relayer.quote_delivery(&message(10_000, 50));
        assert_eq!(within.amount, U256::from(9_970));
        assert!(within.within_tolerance);

        let beyond = relayer.quote_delivery(&message(10_000, 20));
        assert_eq!(beyond.amount, U256::from(9_970));
        assert!(!beyond.within_tolerance);
    }

    #[tokio::test]
    async fn unknown_destination_is_undeliverable() {
        let relayer = Relayer::new(RelayerConfig::default());
        let outcome = relayer.relay(message(100, 50)).await;
        assert!(matches!(outcome, DeliveryOutcome::Undeliverable { transfer_id: 1, .. }));
        assert!(outcome.completion().is_none());
    }
}
