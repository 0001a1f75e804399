//! Concurrency-safe job store.
//!
//! Holds every job for the lifetime of the process. Each operation takes
//! the lock once, so creates and updates are atomic and readers always see
//! a complete snapshot. Accepted mutations are published on the event bus.

use std::collections::HashMap;
use std::sync::Arc;

use motionweave_core::error::CoreError;
use motionweave_core::job::Job;
use motionweave_core::types::JobId;
use tokio::sync::RwLock;

use crate::error::PipelineError;
use crate::events::{EventBus, JobEvent};

pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    events: Arc<EventBus>,
}

impl JobStore {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Insert a new job. Fails with `Conflict` if the id is already taken.
    pub async fn create(&self, job: Job) -> Result<Job, PipelineError> {
        {
            let mut jobs = self.jobs.write().await;
            if jobs.contains_key(&job.id) {
                return Err(CoreError::Conflict(format!("job {} already exists", job.id)).into());
            }
            jobs.insert(job.id, job.clone());
        }
        self.events.publish(JobEvent::for_job(&job));
        Ok(job)
    }

    /// Current snapshot of a job.
    pub async fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.read().await.get(&id).cloned()
    }

    /// Apply `mutate` to a job atomically and return the new snapshot.
    ///
    /// The mutation runs against a copy; if it returns an error the stored
    /// job is left untouched and nothing is published.
    pub async fn update<F>(&self, id: JobId, mutate: F) -> Result<Job, PipelineError>
    where
        F: FnOnce(&mut Job) -> Result<(), CoreError>,
    {
        let updated = {
            let mut jobs = self.jobs.write().await;
            let current = jobs
                .get_mut(&id)
                .ok_or_else(|| PipelineError::NotFound(id.to_string()))?;

            let mut next = current.clone();
            mutate(&mut next)?;
            *current = next.clone();
            next
        };
        self.events.publish(JobEvent::for_job(&updated));
        Ok(updated)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }
}
