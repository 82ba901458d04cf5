use crate::onchain::interface::BridgeSelector;
use ethers::types::{Address, Bytes, H256, U256, U512};
use serde::{Deserialize, Serialize};

/// Four-byte operation signature identifying a swap capability.
pub type Selector = [u8; 4];

/// Caller identity and native value attached to an external call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub value: U256,
}

impl CallContext {
    pub fn new(caller: Address) -> Self {
        CallContext { caller, value: U256::zero() }
    }

    pub fn with_value(caller: Address, value: U256) -> Self {
        CallContext { caller, value }
    }
}

// One hop of a route: opaque call data understood by the codec its selector names
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapLeg {
    pub call_data: Bytes,
}

impl SwapLeg {
    pub fn new(call_data: impl Into<Bytes>) -> Self {
        SwapLeg { call_data: call_data.into() }
    }

    pub fn selector(&self) -> Option<Selector> {
        let head = self.call_data.get(..4)?;
        let mut selector = [0u8; 4];
        selector.copy_from_slice(head);
        Some(selector)
    }
}

/// An ordered, non-empty sequence of legs; each leg consumes the previous leg's output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRoute {
    pub legs: Vec<SwapLeg>,
}

impl SwapRoute {
    pub fn new(legs: Vec<SwapLeg>) -> Self {
        SwapRoute { legs }
    }

    pub fn single(leg: SwapLeg) -> Self {
        SwapRoute { legs: vec![leg] }
    }
}

/// Origin-side input describing one transfer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDescription {
    pub receiver: Address,
    pub dst_chain_id: u64,
    pub max_slippage_bps: u32,
    pub bridge: BridgeSelector,
    pub nonce: u64,
    pub native_out: bool,
    pub fee: U256,
    pub fee_deadline: u64,
    pub fee_signature: Bytes,
    pub amount_in: U256,
    pub token_in: Address,
    pub allow_partial_fill: bool,
}

/// The payload carried across networks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: H256,
    pub swaps: Vec<SwapRoute>,
    pub receiver: Address,
    pub native_out: bool,
    pub fee: U256,
    pub allow_partial_fill: bool,
}

/// `a * b / denominator` rounded down, computed without intermediate overflow.
/// Returns `None` for a zero denominator or a result wider than 256 bits.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    let product: U512 = a.full_mul(b);
    U256::try_from(product / U512::from(denominator)).ok()
}
