// Escrowing transport: locks dispatched funds in the bridge account on the
// origin network and queues a message for the relayer.

use crate::onchain::chain_simulator::ChainState;
use crate::onchain::interface::{BridgeError, BridgeMessage, BridgeSelector, BridgeTransport, DispatchOrder};
use ethers::types::Address;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct SimulatedBridge {
    pub escrow: Address,
    supported: HashSet<BridgeSelector>,
    routable_chains: HashSet<u64>,
}

impl SimulatedBridge {
    pub fn new(escrow: Address) -> Self {
        SimulatedBridge {
            escrow,
            supported: HashSet::new(),
            routable_chains: HashSet::new(),
        }
    }

    pub fn with_bridge(mut self, selector: BridgeSelector) -> Self {
        self.supported.insert(selector);
        self
    }

    pub fn with_route_to(mut self, chain_id: u64) -> Self {
        self.routable_chains.insert(chain_id);
        self
    }
}

impl BridgeTransport for SimulatedBridge {
    fn dispatch(&self, state: &mut ChainState, order: DispatchOrder) -> Result<u64, BridgeError> {
        if !self.supported.contains(&order.bridge) {
            return Err(BridgeError::UnsupportedBridge(order.bridge));
        }
        if !self.routable_chains.contains(&order.dst_chain_id) {
            return Err(BridgeError::UnroutableChain(order.dst_chain_id));
        }

        state.transfer(order.token, order.sender, self.escrow, order.amount)?;
        state.transfer_native(order.sender, self.escrow, order.fee_budget)?;

        let transfer_id = state.next_sequence();
        log::debug!(
            "[EscrowBridge] Locked {} of {:?} for transfer {} to chain {} via {}",
            order.amount,
            order.token,
            transfer_id,
            order.dst_chain_id,
            order.bridge
        );
        state.push_outbox(BridgeMessage {
            transfer_id,
            src_chain_id: state.chain_id(),
            dst_chain_id: order.dst_chain_id,
            dst_address: order.dst_address,
            token: order.token,
            amount: order.amount,
            max_slippage_bps: order.max_slippage_bps,
            payload: order.payload,
            bridge: order.bridge,
            fee_budget: order.fee_budget,
        });
        Ok(transfer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Bytes, U256};

    fn order(bridge: u8, dst_chain_id: u64) -> DispatchOrder {
        DispatchOrder {
            sender: Address::repeat_byte(1),
            dst_address: Address::repeat_byte(2),
            token: Address::repeat_byte(0xAA),
            amount: U256::from(500),
            dst_chain_id,
            nonce: 9,
            max_slippage_bps: 50,
            payload: Bytes::from(vec![1, 2, 3]),
            bridge: BridgeSelector(bridge),
            fee_budget: U256::from(3),
        }
    }

    #[test]
    fn dispatch_escrows_funds_and_queues_message() {
        let escrow = Address::repeat_byte(0xB0);
        let bridge = SimulatedBridge::new(escrow).with_bridge(BridgeSelector(1)).with_route_to(10);
        let mut state = ChainState::new(1, 0);
        state.mint(Address::repeat_byte(0xAA), Address::repeat_byte(1), U256::from(500)).unwrap();
        state.fund_native(Address::repeat_byte(1), U256::from(3)).unwrap();

        let id = bridge.dispatch(&mut state, order(1, 10)).unwrap();

        assert_eq!(id, 1);
        assert_eq!(state.balance_of(Address::repeat_byte(0xAA), escrow), U256::from(500));
        assert_eq!(state.native_balance(escrow), U256::from(3));
        assert_eq!(state.outbox().len(), 1);
        assert_eq!(state.outbox()[0].src_chain_id, 1);
        assert_eq!(state.outbox()[0].payload, Bytes::from(vec![1, 2, 3]));
    }

    #[test]
    fn dispatch_rejects_unknown_bridge_and_chain() {
        let bridge = SimulatedBridge::new(Address::repeat_byte(0xB0))
            .with_bridge(BridgeSelector(1))
            .with_route_to(10);
        let mut state = ChainState::new(1, 0);

        assert_eq!(
            bridge.dispatch(&mut state, order(2, 10)),
            Err(BridgeError::UnsupportedBridge(BridgeSelector(2)))
        );
        assert_eq!(
            bridge.dispatch(&mut state, order(1, 56)),
            Err(BridgeError::UnroutableChain(56))
        );
        assert!(state.outbox().is_empty());
    }
}
