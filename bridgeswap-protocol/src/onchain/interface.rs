use crate::onchain::chain_simulator::{ChainState, LedgerError};
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifies which bridge back-end should carry a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BridgeSelector(pub u8);

impl fmt::Display for BridgeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bridge#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("unsupported bridge selector {0}")]
    UnsupportedBridge(BridgeSelector),
    #[error("destination chain {0} is not routable")]
    UnroutableChain(u64),
    #[error("ledger error during dispatch: {0}")]
    Ledger(#[from] LedgerError),
}

/// Everything the origin side hands to the transport for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOrder {
    pub sender: Address,
    pub dst_address: Address,
    pub token: Address,
    pub amount: U256,
    pub dst_chain_id: u64,
    pub nonce: u64,
    pub max_slippage_bps: u32,
    pub payload: Bytes,
    pub bridge: BridgeSelector,
    // Native value forwarded to pay for bridging
    pub fee_budget: U256,
}

/// A queued cross-network transfer as seen by the relaying side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub transfer_id: u64,
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub dst_address: Address,
    pub token: Address,
    pub amount: U256,
    pub max_slippage_bps: u32,
    pub payload: Bytes,
    pub bridge: BridgeSelector,
    pub fee_budget: U256,
}

/// Outbound half of the transport collaborator. Implementations take custody
/// of the funds inside `state`, so a dispatch that is later unwound by the
/// caller's transaction leaves nothing behind.
pub trait BridgeTransport: Send + Sync {
    fn dispatch(&self, state: &mut ChainState, order: DispatchOrder) -> Result<u64, BridgeError>;
}
