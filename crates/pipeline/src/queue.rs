//! Single-consumer job queue.
//!
//! Submission pushes a job id and returns immediately. One [`QueueWorker`]
//! task drains the channel and runs jobs strictly one after another, which
//! keeps the inference device to a single job at a time.

use std::sync::Arc;

use motionweave_core::types::JobId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::orchestrator::Orchestrator;

/// Sending half of the queue, held by the orchestrator.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<JobId>,
}

/// Receiving half, handed to the [`QueueWorker`].
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<JobId>,
}

impl JobQueue {
    pub fn channel() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, JobReceiver { receiver })
    }

    /// Append a job. Fails only once the worker has shut down.
    pub fn enqueue(&self, id: JobId) -> Result<(), PipelineError> {
        self.sender.send(id).map_err(|_| PipelineError::QueueClosed)
    }
}

/// Long-lived task that executes queued jobs in submission order.
pub struct QueueWorker {
    orchestrator: Arc<Orchestrator>,
    jobs: JobReceiver,
}

impl QueueWorker {
    pub fn new(orchestrator: Arc<Orchestrator>, jobs: JobReceiver) -> Self {
        Self { orchestrator, jobs }
    }

    /// Run until the cancellation token fires or every sender is dropped.
    ///
    /// Cancellation is only observed between jobs; a job that has started
    /// always runs to a terminal state.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("Job queue worker started");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Job queue worker shutting down");
                    break;
                }
                next = self.jobs.receiver.recv() => next,
            };

            let Some(job_id) = next else {
                tracing::info!("Job queue closed, worker exiting");
                break;
            };

            tracing::debug!(job_id = %job_id, "Job dequeued");
            self.orchestrator.run(job_id).await;
        }
    }

    /// Spawn [`QueueWorker::run`] on the Tokio runtime.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
