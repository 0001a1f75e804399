//! Async job orchestration: queueing, stage sequencing, and the interfaces
//! to the external inference capabilities.

pub mod capabilities;
pub mod engine;
pub mod error;
pub mod events;
pub mod invoker;
pub mod orchestrator;
pub mod queue;
pub mod settings;
pub mod store;
