//! Queue error types.

use std::time::Duration;

use render_queue_models::{EntryId, JobId};
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Render job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job record provider failed: {0}")]
    Provider(String),

    #[error("Render job {job_id} timed out after {after:?}")]
    Timeout { job_id: JobId, after: Duration },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn timeout(job_id: &JobId, after: Duration) -> Self {
        Self::Timeout {
            job_id: job_id.clone(),
            after,
        }
    }

    /// Check if the error means the referenced entry or job does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::EntryNotFound(_) | QueueError::JobNotFound(_))
    }
}
