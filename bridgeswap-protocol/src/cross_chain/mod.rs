// Cross-network request handling: wire format, shared types and the orchestrator

pub mod orchestrator;
pub mod request_codec;
pub mod types;

pub use orchestrator::TransferOrchestrator;
pub use types::{Completion, InitiateReceipt, RequestStatus, RouterError, RouterEvent};
