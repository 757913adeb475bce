//! Job coordination for the OCR portal: progress counters, listener
//! channels, and the batch scheduler that drives the OCR adapter.

pub mod broadcaster;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod types;

pub use broadcaster::{ListenerId, ProgressBroadcaster};
pub use error::{RegistryError, SubmitError};
pub use orchestrator::{BatchOrchestrator, SubmittedBatch};
pub use registry::JobRegistry;
pub use types::*;
