// Runs the end-to-end transfer scenarios against two simulated networks and
// prints the events each network emitted.

use bridgeswap_protocol::{
    cross_chain::types::RouterEvent,
    data_structures::CallContext,
    simulation::{DeliveryOutcome, RelayerConfig, SharedNode},
    test_utils::*,
};
use ethers::types::U256;
use std::error::Error;

const FEE_WINDOW_SECS: u64 = 3_600;

async fn print_events(label: &str, node: &SharedNode) -> Result<(), Box<dyn Error>> {
    let node = node.lock().await;
    let events: Vec<&RouterEvent> = node.chain.events().iter().collect();
    println!("{} (chain {}):\n{}", label, node.chain_id(), serde_json::to_string_pretty(&events)?);
    Ok(())
}

fn print_outcomes(outcomes: &[DeliveryOutcome]) {
    for outcome in outcomes {
        match outcome {
            DeliveryOutcome::Received(c) => println!(
                "  delivered: out={} refund={} fee={} status={:?}",
                c.amount_out, c.refund_amount, c.fee_collected, c.status
            ),
            DeliveryOutcome::Fallback { completion, reason } => println!(
                "  fallback ({}): refund={} fee={}",
                reason, completion.refund_amount, completion.fee_collected
            ),
            DeliveryOutcome::Undeliverable { transfer_id, error } => {
                println!("  transfer {} undeliverable: {}", transfer_id, error)
            }
        }
    }
}

async fn direct_swap() -> Result<(), Box<dyn Error>> {
    println!("\n=== Scenario 1: same-network swap ===");
    let world = two_chain_world(RelayerConfig::default());
    let description = plain_description(ORIGIN_CHAIN, USDC, 0);
    {
        let mut origin = world.origin.lock().await;
        let receipt = origin.initiate(
            CallContext::new(USER),
            ORCHESTRATOR,
            &description,
            &[amm_route(USDC, DAI, 25_000, 24_000)],
            &[],
        )?;
        log::info!("Direct swap receipt: {:?}", receipt);
    }
    print_outcomes(&world.relayer.pump(&world.origin).await);
    print_events("Origin events", &world.origin).await
}

async fn partial_fill_transfer() -> Result<(), Box<dyn Error>> {
    println!("\n=== Scenario 2: cross-network transfer with partial fill ===");
    let world = two_chain_world(RelayerConfig::default());
    let mut description = plain_description(DEST_CHAIN, USDC, 40_000);
    description.allow_partial_fill = true;
    sign_description(&mut description, U256::from(120), GENESIS_TIMESTAMP + FEE_WINDOW_SECS);
    // The RFQ leg names a maker without inventory, so its share comes back as a refund
    let dst_swaps = vec![
        amm_route(USDC, DAI, 30_000, 0),
        rfq_route(USDC, DAI, 10_000, 10_000, ESCROW),
    ];
    {
        let mut origin = world.origin.lock().await;
        origin.initiate(CallContext::new(USER), ORCHESTRATOR, &description, &[], &dst_swaps)?;
    }
    print_outcomes(&world.relayer.pump(&world.origin).await);
    print_events("Origin events", &world.origin).await?;
    print_events("Destination events", &world.destination).await
}

async fn slippage_fallback() -> Result<(), Box<dyn Error>> {
    println!("\n=== Scenario 3: bridge slippage beyond tolerance ===");
    let world = two_chain_world(RelayerConfig::default().with_bridge_fee_bps(80));
    let mut description = plain_description(DEST_CHAIN, USDC, 15_000);
    description.max_slippage_bps = 30;
    sign_description(&mut description, U256::from(40), GENESIS_TIMESTAMP + FEE_WINDOW_SECS);
    {
        let mut origin = world.origin.lock().await;
        origin.initiate(
            CallContext::new(USER),
            ORCHESTRATOR,
            &description,
            &[],
            &[amm_route(USDC, DAI, 14_900, 14_000)],
        )?;
    }
    print_outcomes(&world.relayer.pump(&world.origin).await);
    print_events("Destination events", &world.destination).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    log::info!("Running bridge-swap experiments");

    direct_swap().await?;
    partial_fill_transfer().await?;
    slippage_fallback().await?;

    log::info!("All scenarios finished");
    Ok(())
}
