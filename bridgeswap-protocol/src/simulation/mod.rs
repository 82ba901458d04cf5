// Two-network simulation: router nodes and the relayer connecting them

pub mod config;
pub mod relayer;

pub use config::{RelayerConfig, TokenRoute};
pub use relayer::{Delivery, DeliveryEndpoint, DeliveryOutcome, NodeEndpoint, Relayer};

use crate::cross_chain::orchestrator::TransferOrchestrator;
use crate::cross_chain::types::{InitiateReceipt, RouterError};
use crate::data_structures::{CallContext, SwapRoute, TransferDescription};
use crate::onchain::chain_simulator::ChainSimulator;
use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type SharedNode = Arc<Mutex<RouterNode>>;

/// One network together with the orchestrator deployed on it.
pub struct RouterNode {
    pub chain: ChainSimulator,
    pub orchestrator: TransferOrchestrator,
}

impl RouterNode {
    pub fn new(chain: ChainSimulator, orchestrator: TransferOrchestrator) -> Self {
        RouterNode { chain, orchestrator }
    }

    pub fn shared(self) -> SharedNode {
        Arc::new(Mutex::new(self))
    }

    pub fn chain_id(&self) -> u64 {
        self.chain.chain_id()
    }

    pub fn address(&self) -> Address {
        self.orchestrator.address()
    }

    /// Submits an origin-side call and mines a block on success.
    pub fn initiate(
        &mut self,
        ctx: CallContext,
        dst_orchestrator: Address,
        description: &TransferDescription,
        origin_swaps: &[SwapRoute],
        dst_swaps: &[SwapRoute],
    ) -> Result<InitiateReceipt, RouterError> {
        let receipt = self.orchestrator.initiate(
            &mut self.chain,
            ctx,
            dst_orchestrator,
            description,
            origin_swaps,
            dst_swaps,
        )?;
        self.chain.finalize_next_block();
        Ok(receipt)
    }

    pub fn mine(&mut self, blocks: u64) {
        for _ in 0..blocks {
            self.chain.finalize_next_block();
        }
    }
}
