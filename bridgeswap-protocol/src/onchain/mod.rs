// On-chain execution environment and transport seam

pub mod chain_simulator;
pub mod escrow_bridge;
pub mod interface;

pub use chain_simulator::{Block, ChainSimulator, ChainState, LedgerError};
pub use escrow_bridge::SimulatedBridge;
pub use interface::{BridgeError, BridgeMessage, BridgeSelector, BridgeTransport, DispatchOrder};
