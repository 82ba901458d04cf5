// Validates and executes parallel swap routes that share one input token.

use crate::cross_chain::types::RouterError;
use crate::data_structures::{mul_div, SwapLeg, SwapRoute};
use crate::onchain::chain_simulator::ChainState;
use crate::swap::codecs::{CodecRegistry, SwapCodec, SwapFailure, SwapQuote};
use ethers::types::{Address, U256};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ResolvedLeg {
    pub leg: SwapLeg,
    pub codec: Arc<dyn SwapCodec>,
    pub quote: SwapQuote,
}

#[derive(Clone, Debug)]
pub struct ResolvedRoute {
    pub legs: Vec<ResolvedLeg>,
}

impl ResolvedRoute {
    pub fn declared_in(&self) -> U256 {
        self.legs.first().map(|leg| leg.quote.amount_in).unwrap_or_default()
    }
}

/// Output of [`SwapAggregator::sanitize`].
#[derive(Clone, Debug)]
pub struct SanitizedSwaps {
    pub amount_in: U256,
    pub token_in: Address,
    pub token_out: Address,
    pub routes: Vec<ResolvedRoute>,
}

/// Outcome of a destination-side execution with an overridden input.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateFill {
    pub amount_out: U256,
    pub refund: U256,
    // Input consumed by the routes that succeeded
    pub consumed_in: U256,
    pub failed_routes: usize,
}

#[derive(Clone, Debug)]
pub struct SwapAggregator {
    registry: Arc<CodecRegistry>,
}

impl SwapAggregator {
    pub fn new(registry: Arc<CodecRegistry>) -> Self {
        SwapAggregator { registry }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Resolves every leg to its codec and derives the common input token, the
    /// summed declared input and the output token. The output token is read
    /// from the final leg of the first route; other routes are assumed to
    /// converge on it.
    pub fn sanitize(&self, routes: &[SwapRoute]) -> Result<SanitizedSwaps, RouterError> {
        if routes.is_empty() {
            return Err(RouterError::InvalidRoute("no routes supplied".to_string()));
        }

        let mut resolved = Vec::with_capacity(routes.len());
        let mut amount_in = U256::zero();
        let mut token_in: Option<Address> = None;

        for (index, route) in routes.iter().enumerate() {
            if route.legs.is_empty() {
                return Err(RouterError::InvalidRoute(format!("route {} has no legs", index)));
            }

            let mut legs = Vec::with_capacity(route.legs.len());
            for leg in &route.legs {
                let codec = self.registry.resolve(leg)?;
                let quote = codec
                    .decode(&leg.call_data)
                    .map_err(|e| RouterError::InvalidRoute(format!("route {}: {}", index, e)))?;
                if let Some(previous) = legs.last().map(|l: &ResolvedLeg| l.quote.token_out) {
                    if previous != quote.token_in {
                        return Err(RouterError::TokenMismatch {
                            expected: previous,
                            found: quote.token_in,
                        });
                    }
                }
                legs.push(ResolvedLeg { leg: leg.clone(), codec, quote });
            }

            let route = ResolvedRoute { legs };
            let first_token = route.legs[0].quote.token_in;
            match token_in {
                None => token_in = Some(first_token),
                Some(expected) if expected != first_token => {
                    return Err(RouterError::TokenMismatch { expected, found: first_token });
                }
                Some(_) => {}
            }
            amount_in = amount_in
                .checked_add(route.declared_in())
                .ok_or_else(|| RouterError::InvalidRoute("declared input overflows".to_string()))?;
            resolved.push(route);
        }

        let token_out = resolved[0].legs[resolved[0].legs.len() - 1].quote.token_out;
        let token_in = token_in.ok_or_else(|| RouterError::InvalidRoute("no routes supplied".to_string()))?;
        Ok(SanitizedSwaps { amount_in, token_in, token_out, routes: resolved })
    }

    /// Runs every route with its declared input. Stops at the first failing
    /// route and reports `false`; the caller must then treat the whole
    /// operation as failed.
    pub fn execute(&self, state: &mut ChainState, executor: Address, swaps: &SanitizedSwaps) -> (bool, U256) {
        let mut total = U256::zero();
        for (index, route) in swaps.routes.iter().enumerate() {
            match Self::run_route(state, executor, route, route.declared_in()) {
                Ok(out) => total = total.saturating_add(out),
                Err(failure) => {
                    log::warn!("[SwapAggregator] Route {} failed: {}", index, failure);
                    return (false, total);
                }
            }
        }
        (true, total)
    }

    /// Runs the routes against `available` instead of their declared inputs.
    /// Failed routes either become a refund (partial fill) or fail the call.
    pub fn execute_with_override(
        &self,
        state: &mut ChainState,
        executor: Address,
        swaps: &SanitizedSwaps,
        token_in: Address,
        available: U256,
        allow_partial_fill: bool,
    ) -> Result<AggregateFill, RouterError> {
        if token_in != swaps.token_in {
            return Err(RouterError::TokenMismatch { expected: swaps.token_in, found: token_in });
        }

        let shares = Self::apportion(swaps, available);
        let mut fill = AggregateFill::default();
        for (index, (route, share)) in swaps.routes.iter().zip(shares).enumerate() {
            if share.is_zero() {
                continue;
            }
            match Self::run_route(state, executor, route, share) {
                Ok(out) => {
                    fill.amount_out = fill.amount_out.saturating_add(out);
                    fill.consumed_in += share;
                }
                Err(failure) if allow_partial_fill => {
                    log::info!(
                        "[SwapAggregator] Route {} failed ({}); refunding {} of its input",
                        index,
                        failure,
                        share
                    );
                    fill.refund += share;
                    fill.failed_routes += 1;
                }
                Err(failure) => {
                    return Err(RouterError::SwapFailed(format!("route {}: {}", index, failure)));
                }
            }
        }
        Ok(fill)
    }

    /// Splits `available` across routes in proportion to their declared
    /// inputs, rounding down. The last route that declares any input takes the
    /// remainder so the shares always sum to `available`; routes declaring
    /// nothing get nothing unless no route declares anything.
    pub fn apportion(swaps: &SanitizedSwaps, available: U256) -> Vec<U256> {
        let count = swaps.routes.len();
        if count == 0 {
            return Vec::new();
        }
        let remainder_index = swaps
            .routes
            .iter()
            .rposition(|route| !route.declared_in().is_zero())
            .unwrap_or(count - 1);

        let mut shares = Vec::with_capacity(count);
        let mut assigned = U256::zero();
        for (index, route) in swaps.routes.iter().enumerate() {
            let share = if index == remainder_index {
                U256::zero()
            } else if swaps.amount_in.is_zero() {
                // Nothing declared: split evenly
                available / U256::from(count)
            } else {
                mul_div(route.declared_in(), available, swaps.amount_in).unwrap_or_default()
            };
            assigned += share;
            shares.push(share);
        }
        shares[remainder_index] = available - assigned;
        shares
    }

    // One route is atomic: either every leg executes or none of its effects remain.
    fn run_route(
        state: &mut ChainState,
        executor: Address,
        route: &ResolvedRoute,
        amount_in: U256,
    ) -> Result<U256, SwapFailure> {
        state.transact(|scratch| -> Result<U256, SwapFailure> {
            let mut amount = amount_in;
            for leg in &route.legs {
                amount = leg.codec.execute(scratch, executor, &leg.leg.call_data, amount)?;
            }
            Ok(amount)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::codecs::rfq::Quote;
    use crate::swap::codecs::{RfqCodec, UniswapV2Codec};

    const EXECUTOR: u8 = 0xEE;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn aggregator() -> SwapAggregator {
        let registry = CodecRegistry::new()
            .with_codec(Arc::new(UniswapV2Codec::new().with_pair(addr(1), addr(2), addr(0xA1))))
            .with_codec(Arc::new(RfqCodec::new()));
        SwapAggregator::new(Arc::new(registry))
    }

    fn rfq_leg(token_in: u8, token_out: u8, amount_in: u64, amount_out: u64, maker: u8) -> SwapLeg {
        SwapLeg::new(
            Quote {
                token_in: addr(token_in),
                token_out: addr(token_out),
                amount_in: U256::from(amount_in),
                amount_out: U256::from(amount_out),
                maker: addr(maker),
                expiry: 1_000,
            }
            .encode(),
        )
    }

    fn funded_state() -> ChainState {
        let mut state = ChainState::new(1, 0);
        state.mint(addr(1), addr(0xA1), U256::from(1_000_000)).unwrap();
        state.mint(addr(2), addr(0xA1), U256::from(1_000_000)).unwrap();
        // Maker 0x71 can pay out, maker 0x72 is empty
        state.mint(addr(2), addr(0x71), U256::from(1_000_000)).unwrap();
        state
    }

    #[test]
    fn sanitize_sums_inputs_and_takes_first_route_output() {
        let routes = vec![
            SwapRoute::single(rfq_leg(1, 2, 300, 600, 0x71)),
            SwapRoute::new(vec![rfq_leg(1, 3, 700, 700, 0x71), rfq_leg(3, 2, 700, 700, 0x71)]),
        ];
        let swaps = aggregator().sanitize(&routes).unwrap();
        assert_eq!(swaps.amount_in, U256::from(1_000));
        assert_eq!(swaps.token_in, addr(1));
        assert_eq!(swaps.token_out, addr(2));
        assert_eq!(swaps.routes.len(), 2);
        assert_eq!(swaps.routes[1].legs.len(), 2);
    }

    #[test]
    fn sanitize_rejects_mismatched_inputs_and_broken_chains() {
        let agg = aggregator();
        let mismatched = vec![
            SwapRoute::single(rfq_leg(1, 2, 300, 600, 0x71)),
            SwapRoute::single(rfq_leg(4, 2, 300, 600, 0x71)),
        ];
        assert_eq!(
            agg.sanitize(&mismatched).unwrap_err(),
            RouterError::TokenMismatch { expected: addr(1), found: addr(4) }
        );

        let broken = vec![SwapRoute::new(vec![rfq_leg(1, 3, 1, 1, 0x71), rfq_leg(2, 4, 1, 1, 0x71)])];
        assert!(matches!(agg.sanitize(&broken), Err(RouterError::TokenMismatch { .. })));

        assert!(matches!(agg.sanitize(&[]), Err(RouterError::InvalidRoute(_))));
        assert!(matches!(agg.sanitize(&[SwapRoute::new(vec![])]), Err(RouterError::InvalidRoute(_))));
    }

    #[test]
    fn sanitize_rejects_unknown_selector() {
        let routes = vec![SwapRoute::single(SwapLeg::new(vec![0xde, 0xad, 0xbe, 0xef, 0x00]))];
        assert_eq!(
            aggregator().sanitize(&routes).unwrap_err(),
            RouterError::UnknownRoute([0xde, 0xad, 0xbe, 0xef])
        );
    }

    #[test]
    fn execute_reports_failure_without_partial_effects() {
        let agg = aggregator();
        let mut state = funded_state();
        state.mint(addr(1), addr(EXECUTOR), U256::from(1_000)).unwrap();

        let ok = agg
            .sanitize(&[SwapRoute::single(rfq_leg(1, 2, 1_000, 2_000, 0x71))])
            .unwrap();
        assert_eq!(agg.execute(&mut state.clone(), addr(EXECUTOR), &ok), (true, U256::from(2_000)));

        let failing = agg
            .sanitize(&[SwapRoute::single(rfq_leg(1, 2, 1_000, 2_000, 0x72))])
            .unwrap();
        let (succeeded, _) = agg.execute(&mut state, addr(EXECUTOR), &failing);
        assert!(!succeeded);
        assert_eq!(state.balance_of(addr(1), addr(EXECUTOR)), U256::from(1_000));
    }

    #[test]
    fn apportion_is_proportional_and_exact() {
        let agg = aggregator();
        let swaps = agg
            .sanitize(&[
                SwapRoute::single(rfq_leg(1, 2, 1, 1, 0x71)),
                SwapRoute::single(rfq_leg(1, 2, 1, 1, 0x71)),
                SwapRoute::single(rfq_leg(1, 2, 1, 1, 0x71)),
            ])
            .unwrap();
        let shares = SwapAggregator::apportion(&swaps, U256::from(100));
        assert_eq!(shares, vec![U256::from(33), U256::from(33), U256::from(34)]);
    }

    #[test]
    fn apportion_splits_evenly_when_nothing_declared() {
        let agg = aggregator();
        let swaps = agg
            .sanitize(&[
                SwapRoute::single(rfq_leg(1, 2, 0, 0, 0x71)),
                SwapRoute::single(rfq_leg(1, 2, 0, 0, 0x71)),
                SwapRoute::single(rfq_leg(1, 2, 0, 0, 0x71)),
            ])
            .unwrap();
        assert!(swaps.amount_in.is_zero());
        let shares = SwapAggregator::apportion(&swaps, U256::from(10));
        assert_eq!(shares, vec![U256::from(3), U256::from(3), U256::from(4)]);
    }

    #[test]
    fn apportion_keeps_remainder_off_undeclared_routes() {
        let agg = aggregator();
        let swaps = agg
            .sanitize(&[
                SwapRoute::single(rfq_leg(1, 2, 1, 1, 0x71)),
                SwapRoute::single(rfq_leg(1, 2, 1, 1, 0x71)),
                SwapRoute::single(rfq_leg(1, 2, 0, 0, 0x71)),
            ])
            .unwrap();
        let shares = SwapAggregator::apportion(&swaps, U256::from(3));
        assert_eq!(shares, vec![U256::one(), U256::from(2), U256::zero()]);
    }

    #[test]
    fn override_skips_trailing_undeclared_route() {
        let agg = aggregator();
        let mut state = funded_state();
        state.mint(addr(1), addr(EXECUTOR), U256::from(3)).unwrap();
        // The zero-declared route would fail if it received any input
        let swaps = agg
            .sanitize(&[
                SwapRoute::single(rfq_leg(1, 2, 1, 2, 0x71)),
                SwapRoute::single(rfq_leg(1, 2, 1, 2, 0x71)),
                SwapRoute::single(rfq_leg(1, 2, 0, 0, 0x72)),
            ])
            .unwrap();

        let fill = agg
            .execute_with_override(&mut state, addr(EXECUTOR), &swaps, addr(1), U256::from(3), false)
            .unwrap();
        assert_eq!(fill.consumed_in, U256::from(3));
        assert_eq!(fill.amount_out, U256::from(6));
        assert!(fill.refund.is_zero());
    }

    #[test]
    fn override_with_partial_fill_refunds_failed_share() {
        let agg = aggregator();
        let mut state = funded_state();
        state.mint(addr(1), addr(EXECUTOR), U256::from(900)).unwrap();

        // Declared 600/400 split, 900 actually available -> 540/360
        let swaps = agg
            .sanitize(&[
                SwapRoute::single(rfq_leg(1, 2, 600, 1_200, 0x71)),
                SwapRoute::single(rfq_leg(1, 2, 400, 800, 0x72)),
            ])
            .unwrap();
        let fill = agg
            .execute_with_override(&mut state, addr(EXECUTOR), &swaps, addr(1), U256::from(900), true)
            .unwrap();

        assert_eq!(fill.amount_out, U256::from(1_080));
        assert_eq!(fill.consumed_in, U256::from(540));
        assert_eq!(fill.refund, U256::from(360));
        assert_eq!(fill.failed_routes, 1);
        assert_eq!(fill.consumed_in + fill.refund, U256::from(900));
        assert_eq!(state.balance_of(addr(1), addr(EXECUTOR)), U256::from(360));
    }

    #[test]
    fn override_without_partial_fill_fails() {
        let agg = aggregator();
        let mut state = funded_state();
        state.mint(addr(1), addr(EXECUTOR), U256::from(900)).unwrap();
        let swaps = agg
            .sanitize(&[
                SwapRoute::single(rfq_leg(1, 2, 600, 1_200, 0x71)),
                SwapRoute::single(rfq_leg(1, 2, 400, 800, 0x72)),
            ])
            .unwrap();

        let err = agg
            .execute_with_override(&mut state, addr(EXECUTOR), &swaps, addr(1), U256::from(900), false)
            .unwrap_err();
        assert!(matches!(err, RouterError::SwapFailed(_)));
    }

    #[test]
    fn override_checks_delivered_token() {
        let agg = aggregator();
        let swaps = agg.sanitize(&[SwapRoute::single(rfq_leg(1, 2, 1, 1, 0x71))]).unwrap();
        let err = agg
            .execute_with_override(&mut funded_state(), addr(EXECUTOR), &swaps, addr(9), U256::one(), true)
            .unwrap_err();
        assert_eq!(err, RouterError::TokenMismatch { expected: addr(1), found: addr(9) });
    }

    #[test]
    fn amm_route_executes_with_override() {
        let agg = aggregator();
        let mut state = funded_state();
        state.mint(addr(1), addr(EXECUTOR), U256::from(1_000)).unwrap();
        let call = UniswapV2Codec::encode_swap(U256::from(2_000), U256::from(1_900), &[addr(1), addr(2)], addr(EXECUTOR), 1_000);
        let swaps = agg.sanitize(&[SwapRoute::single(SwapLeg::new(call))]).unwrap();

        let fill = agg
            .execute_with_override(&mut state, addr(EXECUTOR), &swaps, addr(1), U256::from(1_000), false)
            .unwrap();
        assert_eq!(fill.amount_out, U256::from(996));
        assert_eq!(fill.refund, U256::zero());
    }
}
