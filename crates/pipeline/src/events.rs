//! In-process job event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans every job mutation out to any number of subscribers
//! (WebSocket clients, tests). It is shared via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use motionweave_core::job::{Job, JobStatus};
use motionweave_core::job_events::{
    EVENT_JOB_COMPLETED, EVENT_JOB_FAILED, EVENT_JOB_PROGRESS, EVENT_JOB_QUEUED,
};
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A snapshot of a job taken right after it changed.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    /// Dot-separated event name, e.g. `"job.progress"`.
    pub event_type: &'static str,
    pub job: Job,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Build the event matching the job's current status.
    pub fn for_job(job: &Job) -> Self {
        let event_type = match job.status {
            JobStatus::Queued => EVENT_JOB_QUEUED,
            JobStatus::Processing => EVENT_JOB_PROGRESS,
            JobStatus::Completed => EVENT_JOB_COMPLETED,
            JobStatus::Failed => EVENT_JOB_FAILED,
        };
        Self {
            event_type,
            job: job.clone(),
            timestamp: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: JobEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
