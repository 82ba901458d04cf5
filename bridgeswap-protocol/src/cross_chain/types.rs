// Types shared by both halves of a cross-network transfer

use crate::data_structures::Selector;
use crate::onchain::chain_simulator::LedgerError;
use crate::onchain::interface::BridgeError;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Terminal status of a request on the destination network.
// Null is never emitted; it is what an unprocessed id reads as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Null,
    Succeeded,
    Fallback,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Null)
    }
}

/// Append-only events, one per terminal transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RouterEvent {
    DirectSwap {
        id: H256,
        amount_in: U256,
        token_in: Address,
        amount_out: U256,
        token_out: Address,
    },
    RequestSent {
        id: H256,
        dst_chain_id: u64,
        src_amount: U256,
        src_token: Address,
        // None when the destination side performs no swap
        dst_token: Option<Address>,
    },
    RequestDone {
        id: H256,
        dst_amount: U256,
        refund_amount: U256,
        fee_collected: U256,
        status: RequestStatus,
    },
}

impl RouterEvent {
    pub fn id(&self) -> H256 {
        match self {
            RouterEvent::DirectSwap { id, .. } => *id,
            RouterEvent::RequestSent { id, .. } => *id,
            RouterEvent::RequestDone { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("request would have no effect")]
    NoOp,
    #[error("attached native value {provided} is below the declared input {required}")]
    InsufficientAmount { provided: U256, required: U256 },
    #[error("token mismatch: expected {expected:?}, found {found:?}")]
    TokenMismatch { expected: Address, found: Address },
    #[error("no swap codec registered for selector 0x{}", hex::encode(.0))]
    UnknownRoute(Selector),
    #[error("invalid swap route: {0}")]
    InvalidRoute(String),
    #[error("swap execution failed: {0}")]
    SwapFailed(String),
    #[error("fee claim signature is invalid")]
    InvalidSignature,
    #[error("fee claim expired at {deadline} (now {now})")]
    ExpiredFee { deadline: u64, now: u64 },
    #[error("malformed request payload: {0}")]
    MalformedPayload(String),
    #[error("request {0:?} was already completed")]
    AlreadyProcessed(H256),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result of a successful origin-side call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitiateReceipt {
    // Same-network request settled without bridging
    Direct {
        id: H256,
        amount_out: U256,
        token_out: Address,
    },
    Sent {
        id: H256,
        transfer_id: u64,
        amount: U256,
        token: Address,
    },
}

impl InitiateReceipt {
    pub fn id(&self) -> H256 {
        match self {
            InitiateReceipt::Direct { id, .. } => *id,
            InitiateReceipt::Sent { id, .. } => *id,
        }
    }
}

/// Accounting of one destination-side completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Completion {
    pub id: H256,
    pub token_out: Address,
    pub amount_out: U256,
    // Input-token value the successful routes consumed, or the whole net
    // amount when it is forwarded without a swap
    pub consumed_in: U256,
    pub refund_amount: U256,
    pub fee_collected: U256,
    pub status: RequestStatus,
}
