//! Event type names published on the job event bus and forwarded to
//! WebSocket subscribers.

/// Job accepted and waiting for the worker.
pub const EVENT_JOB_QUEUED: &str = "job.queued";

/// Stage change or progress update while processing.
pub const EVENT_JOB_PROGRESS: &str = "job.progress";

/// Job finished and the output video is available.
pub const EVENT_JOB_COMPLETED: &str = "job.completed";

/// Job ended with an error.
pub const EVENT_JOB_FAILED: &str = "job.failed";
