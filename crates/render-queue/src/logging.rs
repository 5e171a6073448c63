//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for queue entries with tracing
//! spans and contextual information.

use tracing::{debug, info, warn, Span};

use render_queue_models::{EntryId, JobId};

/// Logger scoped to one queue entry and its render job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    entry_id: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, entry_id: &EntryId) -> Self {
        Self {
            job_id: job_id.to_string(),
            entry_id: entry_id.to_string(),
        }
    }

    /// Log that the entry took a concurrency slot.
    pub fn log_dispatch(&self) {
        info!(
            job_id = %self.job_id,
            entry_id = %self.entry_id,
            "Starting to process job from queue"
        );
    }

    /// Log a non-terminal status poll.
    pub fn log_poll(&self, status: &str, progress: u8) {
        debug!(
            job_id = %self.job_id,
            entry_id = %self.entry_id,
            status,
            progress,
            "Render job still running"
        );
    }

    /// Log a terminal status.
    pub fn log_finished(&self, status: &str) {
        info!(
            job_id = %self.job_id,
            entry_id = %self.entry_id,
            status,
            "Job completed in queue"
        );
    }

    /// Log that the entry was dropped and its slot freed.
    pub fn log_discarded(&self, reason: &str) {
        warn!(
            job_id = %self.job_id,
            entry_id = %self.entry_id,
            "Queue processing failed for job: {}", reason
        );
    }

    /// Log a timeout reclamation.
    pub fn log_timeout(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            entry_id = %self.entry_id,
            "Job timed out in queue: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    /// Create a tracing span for this entry.
    ///
    /// The monitor task runs inside it so provider calls are attributed to
    /// the job being watched.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "render_job",
            job_id = %self.job_id,
            entry_id = %self.entry_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::from("render-123");
        let entry_id = EntryId::from_string("queue_abc");
        let logger = JobLogger::new(&job_id, &entry_id);

        assert_eq!(logger.job_id(), "render-123");
        assert_eq!(logger.entry_id(), "queue_abc");
    }
}
