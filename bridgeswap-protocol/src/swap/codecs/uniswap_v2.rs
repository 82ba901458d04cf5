// Constant-product AMM codec speaking the UniswapV2 router call format.
// Pool reserves are the pool account's token balances on the ledger.

use super::{SwapCodec, SwapFailure, SwapQuote};
use crate::data_structures::{mul_div, Selector};
use crate::onchain::chain_simulator::ChainState;
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, U256};
use std::collections::HashMap;

pub const SWAP_EXACT_TOKENS_SIGNATURE: &str =
    "swapExactTokensForTokens(uint256,uint256,address[],address,uint256)";

// 0.3% LP fee, expressed in thousandths
const FEE_NUMERATOR: u64 = 997;
const FEE_DENOMINATOR: u64 = 1000;

pub fn swap_exact_tokens_selector() -> Selector {
    ethers::utils::id(SWAP_EXACT_TOKENS_SIGNATURE)
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct SwapExactTokens {
    amount_in: U256,
    amount_out_min: U256,
    path: Vec<Address>,
    deadline: U256,
}

#[derive(Clone, Debug, Default)]
pub struct UniswapV2Codec {
    pairs: HashMap<(Address, Address), Address>,
}

fn pair_key(a: Address, b: Address) -> (Address, Address) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Output of a single constant-product hop, fee included.
pub fn get_amount_out(amount_in: U256, reserve_in: U256, reserve_out: U256) -> Option<U256> {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return None;
    }
    let amount_in_with_fee = amount_in.checked_mul(U256::from(FEE_NUMERATOR))?;
    let denominator = reserve_in
        .checked_mul(U256::from(FEE_DENOMINATOR))?
        .checked_add(amount_in_with_fee)?;
    mul_div(amount_in_with_fee, reserve_out, denominator)
}

impl UniswapV2Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(mut self, token_a: Address, token_b: Address, pool: Address) -> Self {
        self.pairs.insert(pair_key(token_a, token_b), pool);
        self
    }

    pub fn pool_for(&self, token_a: Address, token_b: Address) -> Option<Address> {
        self.pairs.get(&pair_key(token_a, token_b)).copied()
    }

    pub fn encode_swap(
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Bytes {
        let mut call_data = swap_exact_tokens_selector().to_vec();
        call_data.extend(abi::encode(&[
            Token::Uint(amount_in),
            Token::Uint(amount_out_min),
            Token::Array(path.iter().copied().map(Token::Address).collect()),
            Token::Address(to),
            Token::Uint(U256::from(deadline)),
        ]));
        call_data.into()
    }

    fn decode_call(call_data: &[u8]) -> Result<SwapExactTokens, SwapFailure> {
        let args = call_data
            .get(4..)
            .ok_or_else(|| SwapFailure::Decode("missing selector".to_string()))?;
        let tokens = abi::decode(
            &[
                ParamType::Uint(256),
                ParamType::Uint(256),
                ParamType::Array(Box::new(ParamType::Address)),
                ParamType::Address,
                ParamType::Uint(256),
            ],
            args,
        )
        .map_err(|e| SwapFailure::Decode(e.to_string()))?;

        let mut tokens = tokens.into_iter();
        let mut next = || tokens.next().ok_or_else(|| SwapFailure::Decode("truncated arguments".to_string()));
        let amount_in = next()?.into_uint();
        let amount_out_min = next()?.into_uint();
        let path = next()?
            .into_array()
            .map(|items| items.into_iter().filter_map(Token::into_address).collect::<Vec<_>>());
        let _to = next()?;
        let deadline = next()?.into_uint();

        match (amount_in, amount_out_min, path, deadline) {
            (Some(amount_in), Some(amount_out_min), Some(path), Some(deadline)) if path.len() >= 2 => {
                Ok(SwapExactTokens { amount_in, amount_out_min, path, deadline })
            }
            _ => Err(SwapFailure::Decode("path needs at least two tokens".to_string())),
        }
    }
}

impl SwapCodec for UniswapV2Codec {
    fn name(&self) -> &'static str {
        "uniswap-v2"
    }

    fn selectors(&self) -> Vec<Selector> {
        vec![swap_exact_tokens_selector()]
    }

    fn decode(&self, call_data: &[u8]) -> Result<SwapQuote, SwapFailure> {
        let call = Self::decode_call(call_data)?;
        Ok(SwapQuote {
            amount_in: call.amount_in,
            token_in: call.path[0],
            token_out: call.path[call.path.len() - 1],
        })
    }

    fn execute(
        &self,
        state: &mut ChainState,
        executor: Address,
        call_data: &[u8],
        amount_in: U256,
    ) -> Result<U256, SwapFailure> {
        let call = Self::decode_call(call_data)?;
        if U256::from(state.timestamp()) > call.deadline {
            return Err(SwapFailure::Expired(call.deadline.low_u64()));
        }
        let minimum = if call.amount_in.is_zero() {
            call.amount_out_min
        } else {
            mul_div(call.amount_out_min, amount_in, call.amount_in).unwrap_or(call.amount_out_min)
        };

        let mut amount = amount_in;
        for hop in call.path.windows(2) {
            let (token_in, token_out) = (hop[0], hop[1]);
            let pool = self
                .pool_for(token_in, token_out)
                .ok_or(SwapFailure::NoLiquidity { token_in, token_out })?;
            let out = get_amount_out(
                amount,
                state.balance_of(token_in, pool),
                state.balance_of(token_out, pool),
            )
            .filter(|out| !out.is_zero())
            .ok_or(SwapFailure::NoLiquidity { token_in, token_out })?;

            state.transfer(token_in, executor, pool, amount)?;
            state.transfer(token_out, pool, executor, out)?;
            amount = out;
        }

        if amount < minimum {
            return Err(SwapFailure::Slippage { minimum, actual: amount });
        }
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn selector_matches_router_abi() {
        assert_eq!(swap_exact_tokens_selector(), [0x38, 0xed, 0x17, 0x39]);
    }

    #[test]
    fn amount_out_applies_fee() {
        // 1000 in against 1:1 reserves of 1_000_000
        let out = get_amount_out(U256::from(1000), U256::from(1_000_000), U256::from(1_000_000)).unwrap();
        assert_eq!(out, U256::from(996));
        assert_eq!(get_amount_out(U256::zero(), U256::one(), U256::one()), None);
    }

    #[test]
    fn decode_reports_path_ends() {
        let call = UniswapV2Codec::encode_swap(
            U256::from(500),
            U256::from(1),
            &[token(1), token(2), token(3)],
            token(9),
            1_000,
        );
        let quote = UniswapV2Codec::new().decode(&call).unwrap();
        assert_eq!(quote.amount_in, U256::from(500));
        assert_eq!(quote.token_in, token(1));
        assert_eq!(quote.token_out, token(3));
    }

    #[test]
    fn decode_rejects_garbage() {
        let codec = UniswapV2Codec::new();
        let mut call = swap_exact_tokens_selector().to_vec();
        call.extend_from_slice(&[0xFF; 7]);
        assert!(matches!(codec.decode(&call), Err(SwapFailure::Decode(_))));

        let single_hop = UniswapV2Codec::encode_swap(U256::one(), U256::zero(), &[token(1)], token(9), 0);
        assert!(matches!(codec.decode(&single_hop), Err(SwapFailure::Decode(_))));
    }

    #[test]
    fn multi_hop_execution_moves_reserves() {
        let pool_ab = token(0xA1);
        let pool_bc = token(0xA2);
        let executor = token(0xEE);
        let codec = UniswapV2Codec::new()
            .with_pair(token(1), token(2), pool_ab)
            .with_pair(token(2), token(0x0A), pool_bc);

        let mut state = ChainState::new(1, 100);
        state.mint(token(1), pool_ab, U256::from(1_000_000)).unwrap();
        state.mint(token(2), pool_ab, U256::from(1_000_000)).unwrap();
        state.mint(token(2), pool_bc, U256::from(1_000_000)).unwrap();
        state.mint(token(0x0A), pool_bc, U256::from(1_000_000)).unwrap();
        state.mint(token(1), executor, U256::from(1000)).unwrap();

        let call = UniswapV2Codec::encode_swap(U256::from(1000), U256::from(990), &[token(1), token(2), token(0x0A)], executor, 200);
        let out = codec.execute(&mut state, executor, &call, U256::from(1000)).unwrap();

        assert_eq!(out, U256::from(992));
        assert_eq!(state.balance_of(token(0x0A), executor), out);
        assert_eq!(state.balance_of(token(1), executor), U256::zero());
        assert_eq!(state.balance_of(token(2), executor), U256::zero());
    }

    #[test]
    fn minimum_scales_with_override_and_enforces_slippage() {
        let pool = token(0xA1);
        let executor = token(0xEE);
        let codec = UniswapV2Codec::new().with_pair(token(1), token(2), pool);
        let mut state = ChainState::new(1, 0);
        state.mint(token(1), pool, U256::from(1_000_000)).unwrap();
        state.mint(token(2), pool, U256::from(1_000_000)).unwrap();
        state.mint(token(1), executor, U256::from(2000)).unwrap();

        // Declared 1000 in with min 996 out; executed with 500 the minimum becomes 498
        let call = UniswapV2Codec::encode_swap(U256::from(1000), U256::from(996), &[token(1), token(2)], executor, 10);
        let out = codec.execute(&mut state.clone(), executor, &call, U256::from(500)).unwrap();
        assert_eq!(out, U256::from(498));

        let strict = UniswapV2Codec::encode_swap(U256::from(1000), U256::from(999), &[token(1), token(2)], executor, 10);
        let err = codec.execute(&mut state.clone(), executor, &strict, U256::from(1000)).unwrap_err();
        assert_eq!(err, SwapFailure::Slippage { minimum: U256::from(999), actual: U256::from(996) });
    }

    #[test]
    fn expired_deadline_and_missing_pool_fail() {
        let executor = token(0xEE);
        let codec = UniswapV2Codec::new();
        let mut state = ChainState::new(1, 500);
        state.mint(token(1), executor, U256::from(10)).unwrap();

        let stale = UniswapV2Codec::encode_swap(U256::from(10), U256::zero(), &[token(1), token(2)], executor, 499);
        assert_eq!(
            codec.execute(&mut state, executor, &stale, U256::from(10)),
            Err(SwapFailure::Expired(499))
        );

        let fresh = UniswapV2Codec::encode_swap(U256::from(10), U256::zero(), &[token(1), token(2)], executor, 600);
        assert_eq!(
            codec.execute(&mut state, executor, &fresh, U256::from(10)),
            Err(SwapFailure::NoLiquidity { token_in: token(1), token_out: token(2) })
        );
    }
}
