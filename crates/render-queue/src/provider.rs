//! Job record providers.
//!
//! The scheduler never renders anything itself. It asks a
//! [`JobRecordProvider`] for the current status of a render job, both when
//! dispatching an entry and while monitoring it.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use render_queue_models::{JobId, RenderJobRecord, RenderJobStatus};

use crate::error::QueueResult;

/// Source of render job status.
#[async_trait]
pub trait JobRecordProvider: Send + Sync {
    /// Look up a render job.
    ///
    /// Returns `Ok(None)` when the job does not exist and `Err` when the
    /// provider itself could not be reached.
    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<RenderJobRecord>>;
}

/// Provider backed by an in-process map.
///
/// Suitable for embedding the queue next to a renderer that reports status
/// in-process, and for tests.
#[derive(Debug, Default)]
pub struct InMemoryJobProvider {
    jobs: RwLock<HashMap<JobId, RenderJobRecord>>,
}

impl InMemoryJobProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn upsert(&self, record: RenderJobRecord) {
        self.write().insert(record.job_id.clone(), record);
    }

    /// Register a queued job.
    pub fn register(&self, job_id: impl Into<JobId>) {
        self.upsert(RenderJobRecord::new(job_id));
    }

    /// Update the status of an existing job. Returns false if unknown.
    pub fn set_status(&self, job_id: &JobId, status: RenderJobStatus) -> bool {
        match self.write().get_mut(job_id) {
            Some(record) => {
                record.status = status;
                if status == RenderJobStatus::Completed {
                    record.progress = 100;
                }
                true
            }
            None => false,
        }
    }

    /// Update the progress of an existing job. Returns false if unknown.
    pub fn set_progress(&self, job_id: &JobId, progress: u8) -> bool {
        match self.write().get_mut(job_id) {
            Some(record) => {
                record.progress = progress.min(100);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, job_id: &JobId) -> Option<RenderJobRecord> {
        self.write().remove(job_id)
    }

    pub fn get(&self, job_id: &JobId) -> Option<RenderJobRecord> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<JobId, RenderJobRecord>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl JobRecordProvider for InMemoryJobProvider {
    async fn get_job(&self, job_id: &JobId) -> QueueResult<Option<RenderJobRecord>> {
        Ok(self.get(job_id))
    }
}
