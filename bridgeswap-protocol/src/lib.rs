pub mod authorization;
pub mod config;
pub mod cross_chain;
pub mod data_structures;
pub mod onchain;
pub mod simulation;
pub mod swap;

pub mod test_utils; // Shared fixtures for unit tests, integration tests and experiments

pub use config::{ConfigError, RouterConfig};
pub use cross_chain::{Completion, InitiateReceipt, RequestStatus, RouterError, RouterEvent, TransferOrchestrator};
