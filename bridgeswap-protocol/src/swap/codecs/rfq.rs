// Request-for-quote codec: a maker's firm quote, filled pro rata from the
// maker's own balances.

use super::{SwapCodec, SwapFailure, SwapQuote};
use crate::data_structures::{mul_div, Selector};
use crate::onchain::chain_simulator::ChainState;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};

pub const FILL_QUOTE_SIGNATURE: &str = "fillQuote(address,address,uint256,uint256,address,uint256)";

pub fn fill_quote_selector() -> Selector {
    ethers::utils::id(FILL_QUOTE_SIGNATURE)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quote {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub maker: Address,
    pub expiry: u64,
}

impl Quote {
    pub fn encode(&self) -> Bytes {
        let mut call_data = fill_quote_selector().to_vec();
        call_data.extend(abi::encode(&[
            Token::Address(self.token_in),
            Token::Address(self.token_out),
            Token::Uint(self.amount_in),
            Token::Uint(self.amount_out),
            Token::Address(self.maker),
            Token::Uint(U256::from(self.expiry)),
        ]));
        call_data.into()
    }

    pub fn decode(call_data: &[u8]) -> Result<Self, SwapFailure> {
        let args = call_data
            .get(4..)
            .ok_or_else(|| SwapFailure::Decode("missing selector".to_string()))?;
        let tokens = abi::decode(
            &[
                ParamType::Address,
                ParamType::Address,
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Address,
                ParamType::Uint(256),
            ],
            args,
        )
        .map_err(|e| SwapFailure::Decode(e.to_string()))?;

        match tokens.as_slice() {
            [Token::Address(token_in), Token::Address(token_out), Token::Uint(amount_in), Token::Uint(amount_out), Token::Address(maker), Token::Uint(expiry)] => {
                Ok(Quote {
                    token_in: *token_in,
                    token_out: *token_out,
                    amount_in: *amount_in,
                    amount_out: *amount_out,
                    maker: *maker,
                    expiry: u64::try_from(*expiry).unwrap_or(u64::MAX),
                })
            }
            _ => Err(SwapFailure::Decode("unexpected fillQuote layout".to_string())),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RfqCodec;

impl RfqCodec {
    pub fn new() -> Self {
        RfqCodec
    }
}

impl SwapCodec for RfqCodec {
    fn name(&self) -> &'static str {
        "rfq"
    }

    fn selectors(&self) -> Vec<Selector> {
        vec![fill_quote_selector()]
    }

    fn decode(&self, call_data: &[u8]) -> Result<SwapQuote, SwapFailure> {
        let quote = Quote::decode(call_data)?;
        Ok(SwapQuote {
            amount_in: quote.amount_in,
            token_in: quote.token_in,
            token_out: quote.token_out,
        })
    }

    fn execute(
        &self,
        state: &mut ChainState,
        executor: Address,
        call_data: &[u8],
        amount_in: U256,
    ) -> Result<U256, SwapFailure> {
        let quote = Quote::decode(call_data)?;
        if state.timestamp() >= quote.expiry {
            return Err(SwapFailure::Expired(quote.expiry));
        }
        let amount_out = mul_div(quote.amount_out, amount_in, quote.amount_in)
            .filter(|out| !out.is_zero())
            .ok_or(SwapFailure::NoLiquidity {
                token_in: quote.token_in,
                token_out: quote.token_out,
            })?;

        if state.balance_of(quote.token_out, quote.maker) < amount_out {
            return Err(SwapFailure::NoLiquidity {
                token_in: quote.token_in,
                token_out: quote.token_out,
            });
        }
        state.transfer(quote.token_in, executor, quote.maker, amount_in)?;
        state.transfer(quote.token_out, quote.maker, executor, amount_out)?;
        Ok(amount_out)
    }
}
