//! Swap execution back-ends.
//!
//! A codec understands the call data of one family of swap venues. The
//! aggregator only ever sees the declared input/output of a leg (via
//! [`SwapCodec::decode`]) and the amount produced by [`SwapCodec::execute`];
//! everything venue-specific stays behind this trait. Codecs are looked up by
//! the four-byte selector at the head of each leg's call data.

pub mod rfq;
pub mod uniswap_v2;

pub use rfq::RfqCodec;
pub use uniswap_v2::UniswapV2Codec;

use crate::cross_chain::types::RouterError;
use crate::data_structures::{Selector, SwapLeg};
use crate::onchain::chain_simulator::{ChainState, LedgerError};
use ethers::types::{Address, U256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// What a leg declares before execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapQuote {
    pub amount_in: U256,
    pub token_in: Address,
    pub token_out: Address,
}

/// Why a single leg could not be executed. Route-level and recoverable when
/// partial fills are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapFailure {
    #[error("undecodable call data: {0}")]
    Decode(String),
    #[error("output {actual} below minimum {minimum}")]
    Slippage { minimum: U256, actual: U256 },
    #[error("no liquidity for {token_in:?} -> {token_out:?}")]
    NoLiquidity { token_in: Address, token_out: Address },
    #[error("quote expired at {0}")]
    Expired(u64),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub trait SwapCodec: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Selectors of the operations this codec executes.
    fn selectors(&self) -> Vec<Selector>;

    fn decode(&self, call_data: &[u8]) -> Result<SwapQuote, SwapFailure>;

    /// Executes the leg with `amount_in` replacing the declared input, taking
    /// input from and paying output to `executor`. Limits encoded in the call
    /// data scale with the override.
    fn execute(
        &self,
        state: &mut ChainState,
        executor: Address,
        call_data: &[u8],
        amount_in: U256,
    ) -> Result<U256, SwapFailure>;
}

/// Maps selectors to codecs.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<Selector, Arc<dyn SwapCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, codec: Arc<dyn SwapCodec>) {
        for selector in codec.selectors() {
            if let Some(previous) = self.codecs.insert(selector, codec.clone()) {
                log::warn!(
                    "[CodecRegistry] Selector 0x{} moved from {} to {}",
                    hex::encode(selector),
                    previous.name(),
                    codec.name()
                );
            }
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn SwapCodec>) -> Self {
        self.register(codec);
        self
    }

    pub fn resolve(&self, leg: &SwapLeg) -> Result<Arc<dyn SwapCodec>, RouterError> {
        let selector = leg
            .selector()
            .ok_or_else(|| RouterError::InvalidRoute("leg call data shorter than a selector".to_string()))?;
        self.codecs
            .get(&selector)
            .cloned()
            .ok_or(RouterError::UnknownRoute(selector))
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self
            .codecs
            .iter()
            .map(|(selector, codec)| (hex::encode(selector), codec.name()))
            .collect();
        entries.sort();
        f.debug_struct("CodecRegistry").field("codecs", &entries).finish()
    }
}
