// Shared fixtures for unit tests, integration tests and the experiments binary:
// a two-network world with AMM pools, an RFQ maker and a fee authority.

use crate::authorization::{sign_fee_claim, DEFAULT_FEE_DOMAIN_TAG};
use crate::config::RouterConfig;
use crate::cross_chain::orchestrator::TransferOrchestrator;
use crate::cross_chain::request_codec;
use crate::data_structures::{SwapLeg, SwapRoute, TransferDescription};
use crate::onchain::chain_simulator::ChainSimulator;
use crate::onchain::escrow_bridge::SimulatedBridge;
use crate::onchain::interface::BridgeSelector;
use crate::simulation::{RelayerConfig, Relayer, RouterNode, SharedNode};
use crate::swap::codecs::rfq::Quote;
use crate::swap::codecs::{CodecRegistry, RfqCodec, UniswapV2Codec};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, H160, U256};
use std::sync::Arc;

pub const ORIGIN_CHAIN: u64 = 1;
pub const DEST_CHAIN: u64 = 2;
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;
// Far enough out that no fixture swap expires during a test
pub const SWAP_DEADLINE: u64 = GENESIS_TIMESTAMP + 86_400;

pub const USER: Address = H160([0x10; 20]);
pub const RECEIVER: Address = H160([0x20; 20]);
pub const ORCHESTRATOR: Address = H160([0x0C; 20]);
pub const ESCROW: Address = H160([0xE5; 20]);
pub const FEE_COLLECTOR: Address = H160([0xFC; 20]);
pub const RFQ_MAKER: Address = H160([0x4B; 20]);

pub const USDC: Address = H160([0xA0; 20]);
pub const DAI: Address = H160([0xD0; 20]);
pub const WETH: Address = H160([0x77; 20]);
pub const POOL_USDC_DAI: Address = H160([0x1A; 20]);
pub const POOL_WETH_USDC: Address = H160([0x1B; 20]);

pub const BRIDGE: BridgeSelector = BridgeSelector(1);

pub const INITIAL_USER_BALANCE: u64 = 1_000_000;
pub const INITIAL_NATIVE_BALANCE: u64 = 1_000_000;
pub const POOL_RESERVE: u64 = 1_000_000;
pub const MAKER_INVENTORY: u64 = 1_000_000;

const FEE_AUTHORITY_SEED: [u8; 32] = [0x5E; 32];

/// Deterministic key of the off-chain fee authority.
pub fn fee_authority() -> LocalWallet {
    LocalWallet::from_bytes(&FEE_AUTHORITY_SEED).expect("fixed seed is a valid secp256k1 key")
}

pub fn router_config(chain_id: u64, fee_authorizer: Address) -> RouterConfig {
    RouterConfig::new(chain_id, ORCHESTRATOR, WETH, fee_authorizer).with_fee_collector(FEE_COLLECTOR)
}

pub fn codec_registry() -> CodecRegistry {
    CodecRegistry::new()
        .with_codec(Arc::new(
            UniswapV2Codec::new()
                .with_pair(USDC, DAI, POOL_USDC_DAI)
                .with_pair(WETH, USDC, POOL_WETH_USDC),
        ))
        .with_codec(Arc::new(RfqCodec::new()))
}

fn seeded_chain(chain_id: u64) -> ChainSimulator {
    let mut chain = ChainSimulator::new(chain_id, GENESIS_TIMESTAMP);
    let state = chain.state_mut();
    let genesis = [
        (USDC, USER, INITIAL_USER_BALANCE),
        (USDC, POOL_USDC_DAI, POOL_RESERVE),
        (DAI, POOL_USDC_DAI, POOL_RESERVE),
        (WETH, POOL_WETH_USDC, POOL_RESERVE),
        (USDC, POOL_WETH_USDC, POOL_RESERVE),
        (DAI, RFQ_MAKER, MAKER_INVENTORY),
    ];
    for (token, holder, amount) in genesis {
        state
            .mint(token, holder, U256::from(amount))
            .expect("genesis balances cannot overflow");
    }
    // Native backing for the wrapped tokens minted into the pool
    state
        .fund_native(WETH, U256::from(POOL_RESERVE))
        .expect("genesis balances cannot overflow");
    state
        .fund_native(USER, U256::from(INITIAL_NATIVE_BALANCE))
        .expect("genesis balances cannot overflow");
    chain
}

pub fn origin_chain() -> ChainSimulator {
    seeded_chain(ORIGIN_CHAIN)
}

pub fn destination_chain() -> ChainSimulator {
    seeded_chain(DEST_CHAIN)
}

/// Transfer of `amount_in` of `token_in` with no fee claim attached yet.
pub fn plain_description(dst_chain_id: u64, token_in: Address, amount_in: u64) -> TransferDescription {
    TransferDescription {
        receiver: RECEIVER,
        dst_chain_id,
        max_slippage_bps: 50,
        bridge: BRIDGE,
        nonce: 1,
        native_out: false,
        fee: U256::zero(),
        fee_deadline: 0,
        fee_signature: Bytes::default(),
        amount_in: U256::from(amount_in),
        token_in,
        allow_partial_fill: false,
    }
}

/// Attaches a fee claim signed by [`fee_authority`].
pub fn sign_description(description: &mut TransferDescription, fee: U256, fee_deadline: u64) {
    description.fee = fee;
    description.fee_deadline = fee_deadline;
    description.fee_signature = futures::executor::block_on(sign_fee_claim(
        &fee_authority(),
        DEFAULT_FEE_DOMAIN_TAG,
        fee,
        fee_deadline,
        description.dst_chain_id,
    ))
    .expect("local wallet signing cannot fail");
}

pub fn amm_route(token_in: Address, token_out: Address, amount_in: u64, min_out: u64) -> SwapRoute {
    SwapRoute::single(SwapLeg::new(UniswapV2Codec::encode_swap(
        U256::from(amount_in),
        U256::from(min_out),
        &[token_in, token_out],
        ORCHESTRATOR,
        SWAP_DEADLINE,
    )))
}

pub fn rfq_route(token_in: Address, token_out: Address, amount_in: u64, amount_out: u64, maker: Address) -> SwapRoute {
    SwapRoute::single(SwapLeg::new(
        Quote {
            token_in,
            token_out,
            amount_in: U256::from(amount_in),
            amount_out: U256::from(amount_out),
            maker,
            expiry: SWAP_DEADLINE,
        }
        .encode(),
    ))
}

/// Payload as the origin would have built it for `USER -> RECEIVER` with nonce 1.
pub fn payload_with(fee: U256, dst_swaps: Vec<SwapRoute>, allow_partial_fill: bool) -> Bytes {
    let mut description = plain_description(DEST_CHAIN, USDC, 0);
    description.fee = fee;
    description.allow_partial_fill = allow_partial_fill;
    let id = request_codec::request_id(USER, RECEIVER, ORIGIN_CHAIN, description.nonce);
    request_codec::encode(id, &description, &dst_swaps)
}

fn router_node(chain: ChainSimulator, routable_to: u64) -> RouterNode {
    let config = router_config(chain.chain_id(), fee_authority().address());
    let transport = SimulatedBridge::new(ESCROW).with_bridge(BRIDGE).with_route_to(routable_to);
    let orchestrator = TransferOrchestrator::new(config, Arc::new(codec_registry()), Arc::new(transport));
    RouterNode::new(chain, orchestrator)
}

/// Origin and destination networks wired together through a relayer.
pub struct TestWorld {
    pub origin: SharedNode,
    pub destination: SharedNode,
    pub relayer: Relayer,
}

pub fn two_chain_world(relayer_config: RelayerConfig) -> TestWorld {
    let origin = router_node(origin_chain(), DEST_CHAIN).shared();
    let destination = router_node(destination_chain(), ORIGIN_CHAIN).shared();
    let mut relayer = Relayer::new(relayer_config);
    relayer.register_node(ORIGIN_CHAIN, origin.clone());
    relayer.register_node(DEST_CHAIN, destination.clone());
    TestWorld { origin, destination, relayer }
}
