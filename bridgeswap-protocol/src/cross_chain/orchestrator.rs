// Origin and destination entry points of a cross-network swap-and-transfer.
//
// Every entry point runs inside one `ChainSimulator::transact` scope: funds
// pulled from the caller, wraps, swaps, events and queued bridge messages are
// all discarded together when any step fails.

use crate::authorization::FeeAuthorizer;
use crate::config::RouterConfig;
use crate::cross_chain::request_codec;
use crate::cross_chain::types::{Completion, InitiateReceipt, RequestStatus, RouterError, RouterEvent};
use crate::data_structures::{CallContext, Request, SwapRoute, TransferDescription};
use crate::onchain::chain_simulator::{ChainSimulator, ChainState};
use crate::onchain::interface::{BridgeTransport, DispatchOrder};
use crate::swap::aggregator::SwapAggregator;
use crate::swap::codecs::CodecRegistry;
use ethers::types::{Address, H256, U256};
use std::sync::Arc;

#[derive(Clone)]
pub struct TransferOrchestrator {
    config: RouterConfig,
    aggregator: SwapAggregator,
    fee_authorizer: FeeAuthorizer,
    transport: Arc<dyn BridgeTransport>,
}

impl TransferOrchestrator {
    pub fn new(config: RouterConfig, registry: Arc<CodecRegistry>, transport: Arc<dyn BridgeTransport>) -> Self {
        let fee_authorizer = FeeAuthorizer::from_config(&config);
        TransferOrchestrator {
            config,
            aggregator: SwapAggregator::new(registry),
            fee_authorizer,
            transport,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn address(&self) -> Address {
        self.config.orchestrator
    }

    pub fn aggregator(&self) -> &SwapAggregator {
        &self.aggregator
    }

    pub fn fee_authorizer(&self) -> &FeeAuthorizer {
        &self.fee_authorizer
    }

    /// Origin entry point. Acquires the input, runs the optional origin swap
    /// and either settles locally (same network) or hands the output to the
    /// transport together with the encoded request.
    pub fn initiate(
        &self,
        chain: &mut ChainSimulator,
        ctx: CallContext,
        dst_orchestrator: Address,
        description: &TransferDescription,
        origin_swaps: &[SwapRoute],
        dst_swaps: &[SwapRoute],
    ) -> Result<InitiateReceipt, RouterError> {
        chain.transact(|state| self.initiate_in(state, ctx, dst_orchestrator, description, origin_swaps, dst_swaps))
    }

    fn initiate_in(
        &self,
        state: &mut ChainState,
        ctx: CallContext,
        dst_orchestrator: Address,
        description: &TransferDescription,
        origin_swaps: &[SwapRoute],
        dst_swaps: &[SwapRoute],
    ) -> Result<InitiateReceipt, RouterError> {
        let chain_id = self.config.chain_id;
        let me = self.config.orchestrator;

        if origin_swaps.is_empty()
            && (description.dst_chain_id == chain_id || description.amount_in.is_zero() || description.token_in.is_zero())
        {
            return Err(RouterError::NoOp);
        }

        // Attached value arrives with the call
        state.transfer_native(ctx.caller, me, ctx.value)?;

        let origin = if origin_swaps.is_empty() {
            None
        } else {
            Some(self.aggregator.sanitize(origin_swaps)?)
        };
        let (token_in, amount_in) = match &origin {
            Some(swaps) => (swaps.token_in, swaps.amount_in),
            None => (description.token_in, description.amount_in),
        };

        let fee_budget = if !ctx.value.is_zero() && token_in == self.config.wrapped_native {
            if ctx.value < amount_in {
                return Err(RouterError::InsufficientAmount { provided: ctx.value, required: amount_in });
            }
            state.wrap_native(self.config.wrapped_native, me, amount_in)?;
            ctx.value - amount_in
        } else {
            state.transfer(token_in, ctx.caller, me, amount_in)?;
            ctx.value
        };

        let (token_out, amount_out) = match &origin {
            Some(swaps) => {
                let (all_succeeded, total) = self.aggregator.execute(state, me, swaps);
                if !all_succeeded {
                    return Err(RouterError::SwapFailed("origin swap did not complete".to_string()));
                }
                (swaps.token_out, total)
            }
            None => (token_in, amount_in),
        };

        let id = request_codec::request_id(ctx.caller, description.receiver, chain_id, description.nonce);

        if description.dst_chain_id == chain_id {
            self.disburse(state, token_out, amount_out, description.receiver, description.native_out)?;
            state.transfer_native(me, ctx.caller, fee_budget)?;
            state.emit(RouterEvent::DirectSwap { id, amount_in, token_in, amount_out, token_out });
            log::info!(
                "[Orchestrator chain={}] Direct swap {}: {} -> {} of {:?}",
                chain_id,
                short_id(&id),
                amount_in,
                amount_out,
                token_out
            );
            return Ok(InitiateReceipt::Direct { id, amount_out, token_out });
        }

        self.fee_authorizer.verify(
            description.fee,
            description.fee_deadline,
            description.dst_chain_id,
            &description.fee_signature,
            state.timestamp(),
        )?;

        let dst_token = if dst_swaps.is_empty() {
            None
        } else {
            Some(self.aggregator.sanitize(dst_swaps)?.token_out)
        };

        let payload = request_codec::encode(id, description, dst_swaps);
        let transfer_id = self.transport.dispatch(
            state,
            DispatchOrder {
                sender: me,
                dst_address: dst_orchestrator,
                token: token_out,
                amount: amount_out,
                dst_chain_id: description.dst_chain_id,
                nonce: description.nonce,
                max_slippage_bps: description.max_slippage_bps,
                payload,
                bridge: description.bridge,
                fee_budget,
            },
        )?;

        state.emit(RouterEvent::RequestSent {
            id,
            dst_chain_id: description.dst_chain_id,
            src_amount: amount_out,
            src_token: token_out,
            dst_token,
        });
        log::info!(
            "[Orchestrator chain={}] Request {} sent to chain {} as transfer {} ({} of {:?})",
            chain_id,
            short_id(&id),
            description.dst_chain_id,
            transfer_id,
            amount_out,
            token_out
        );
        Ok(InitiateReceipt::Sent { id, transfer_id, amount: amount_out, token: token_out })
    }

    /// Destination success callback. The transport has already credited
    /// `delivered_amount` of `delivered_token` to this orchestrator.
    pub fn on_transfer_received(
        &self,
        chain: &mut ChainSimulator,
        delivered_token: Address,
        delivered_amount: U256,
        payload: &[u8],
    ) -> Result<Completion, RouterError> {
        chain.transact(|state| self.receive_in(state, delivered_token, delivered_amount, payload))
    }

    fn receive_in(
        &self,
        state: &mut ChainState,
        delivered_token: Address,
        delivered_amount: U256,
        payload: &[u8],
    ) -> Result<Completion, RouterError> {
        let request = request_codec::decode(payload)?;
        self.ensure_unprocessed(state, &request)?;

        if delivered_amount < request.fee {
            log::warn!(
                "[Orchestrator chain={}] Request {}: delivered {} does not cover fee {}; keeping all as fee",
                self.config.chain_id,
                short_id(&request.id),
                delivered_amount,
                request.fee
            );
            self.collect_fee(state, delivered_token, delivered_amount)?;
            return Ok(self.complete(
                state,
                &request,
                Completion {
                    id: request.id,
                    token_out: delivered_token,
                    amount_out: U256::zero(),
                    consumed_in: U256::zero(),
                    refund_amount: U256::zero(),
                    fee_collected: delivered_amount,
                    status: RequestStatus::Succeeded,
                },
            ));
        }

        let fee = request.fee;
        let net = delivered_amount - fee;
        self.collect_fee(state, delivered_token, fee)?;

        let (token_out, amount_out, consumed_in, refund) = if request.swaps.is_empty() {
            (delivered_token, net, net, U256::zero())
        } else {
            let swaps = self.aggregator.sanitize(&request.swaps)?;
            if swaps.token_in != delivered_token {
                return Err(RouterError::TokenMismatch { expected: swaps.token_in, found: delivered_token });
            }
            let fill = self.aggregator.execute_with_override(
                state,
                self.config.orchestrator,
                &swaps,
                delivered_token,
                net,
                request.allow_partial_fill,
            )?;
            (swaps.token_out, fill.amount_out, fill.consumed_in, fill.refund)
        };

        if !refund.is_zero() {
            state.transfer(delivered_token, self.config.orchestrator, request.receiver, refund)?;
        }
        self.disburse(state, token_out, amount_out, request.receiver, request.native_out)?;

        Ok(self.complete(
            state,
            &request,
            Completion {
                id: request.id,
                token_out,
                amount_out,
                consumed_in,
                refund_amount: refund,
                fee_collected: fee,
                status: RequestStatus::Succeeded,
            },
        ))
    }

    /// Destination fallback callback: refunds the delivered token, minus the
    /// fee, to the receiver without attempting any swap.
    pub fn on_transfer_failed(
        &self,
        chain: &mut ChainSimulator,
        delivered_token: Address,
        delivered_amount: U256,
        payload: &[u8],
    ) -> Result<Completion, RouterError> {
        chain.transact(|state| -> Result<Completion, RouterError> {
            let request = request_codec::decode(payload)?;
            self.ensure_unprocessed(state, &request)?;

            let fee_collected = request.fee.min(delivered_amount);
            let refund = delivered_amount - fee_collected;
            self.collect_fee(state, delivered_token, fee_collected)?;
            state.transfer(delivered_token, self.config.orchestrator, request.receiver, refund)?;

            Ok(self.complete(
                state,
                &request,
                Completion {
                    id: request.id,
                    token_out: delivered_token,
                    amount_out: U256::zero(),
                    consumed_in: U256::zero(),
                    refund_amount: refund,
                    fee_collected,
                    status: RequestStatus::Fallback,
                },
            ))
        })
    }

    fn ensure_unprocessed(&self, state: &ChainState, request: &Request) -> Result<(), RouterError> {
        if state.request_status(&request.id).is_terminal() {
            log::warn!(
                "[Orchestrator chain={}] Ignoring repeated completion of {}",
                self.config.chain_id,
                short_id(&request.id)
            );
            return Err(RouterError::AlreadyProcessed(request.id));
        }
        Ok(())
    }

    // Records the terminal status and emits the single RequestDone event for the id
    fn complete(&self, state: &mut ChainState, request: &Request, completion: Completion) -> Completion {
        state.set_request_status(request.id, completion.status);
        state.emit(RouterEvent::RequestDone {
            id: request.id,
            dst_amount: completion.amount_out,
            refund_amount: completion.refund_amount,
            fee_collected: completion.fee_collected,
            status: completion.status,
        });
        log::info!(
            "[Orchestrator chain={}] Request {} done ({:?}): out={} refund={} fee={}",
            self.config.chain_id,
            short_id(&request.id),
            completion.status,
            completion.amount_out,
            completion.refund_amount,
            completion.fee_collected
        );
        completion
    }

    fn collect_fee(&self, state: &mut ChainState, token: Address, amount: U256) -> Result<(), RouterError> {
        state.transfer(token, self.config.orchestrator, self.config.fee_recipient(), amount)?;
        Ok(())
    }

    fn disburse(
        &self,
        state: &mut ChainState,
        token: Address,
        amount: U256,
        to: Address,
        native_out: bool,
    ) -> Result<(), RouterError> {
        let me = self.config.orchestrator;
        if native_out && token == self.config.wrapped_native {
            state.unwrap_native(self.config.wrapped_native, me, amount)?;
            state.transfer_native(me, to, amount)?;
        } else {
            state.transfer(token, me, to, amount)?;
        }
        Ok(())
    }
}

fn short_id(id: &H256) -> String {
    hex::encode(&id.as_bytes()[..4])
}
