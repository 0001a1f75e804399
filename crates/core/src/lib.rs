//! Pure domain logic for the Motion Weave generation pipeline.
//!
//! No async and no I/O: job state machine, chunk scheduling, cross-fade
//! stitching, progress mapping and frame buffers.

pub mod chunking;
pub mod error;
pub mod frame;
pub mod job;
pub mod job_events;
pub mod progress;
pub mod resolution;
pub mod stitching;
pub mod types;
