//! Completion monitor for dispatched render jobs.
//!
//! Polls the job record provider until the job reaches a terminal status or
//! its maximum lifetime elapses. The monitor only observes; the scheduler
//! applies the outcome to its state.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, sleep_until, timeout_at, Instant, MissedTickBehavior};
use tracing::warn;

use render_queue_models::{JobId, RenderJobStatus};

use crate::error::QueueError;
use crate::logging::JobLogger;
use crate::provider::JobRecordProvider;

/// How a monitored job left the processing set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MonitorOutcome {
    /// The provider reported a terminal status.
    Finished(RenderJobStatus),
    /// The job outlived the timeout without a terminal status.
    TimedOut,
    /// The provider no longer knows the job.
    Vanished,
    /// The scheduler is shutting down.
    Shutdown,
}

/// Poll `job_id` every `poll_interval` until it finishes or `timeout` elapses.
pub(crate) async fn watch_job(
    provider: &dyn JobRecordProvider,
    job_id: &JobId,
    poll_interval: Duration,
    timeout: Duration,
    shutdown: &mut watch::Receiver<bool>,
    logger: &JobLogger,
) -> MonitorOutcome {
    let started = Instant::now();
    let deadline = started + timeout;
    let mut ticker = interval_at(started + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let expiry = sleep_until(deadline);
    tokio::pin!(expiry);

    loop {
        if *shutdown.borrow() {
            return MonitorOutcome::Shutdown;
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return MonitorOutcome::Shutdown;
                }
            }
            _ = &mut expiry => return MonitorOutcome::TimedOut,
            _ = ticker.tick() => {
                // A hung provider call must not outlive the deadline.
                match timeout_at(deadline, provider.get_job(job_id)).await {
                    Err(_) => return MonitorOutcome::TimedOut,
                    Ok(Ok(Some(record))) if record.is_terminal() => {
                        return MonitorOutcome::Finished(record.status);
                    }
                    Ok(Ok(Some(record))) => logger.log_poll(record.status.as_str(), record.progress),
                    Ok(Ok(None)) => return MonitorOutcome::Vanished,
                    Ok(Err(e)) => {
                        warn!(job_id = %job_id, "Failed to poll render job status: {}", e);
                    }
                }
            }
        }
    }
}

/// Error describing a timeout outcome, for logging.
pub(crate) fn timeout_error(job_id: &JobId, timeout: Duration) -> QueueError {
    QueueError::timeout(job_id, timeout)
}
