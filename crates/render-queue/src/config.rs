//! Scheduler configuration.

use std::time::Duration;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum jobs dispatched at once
    pub max_concurrent: usize,
    /// How often a dispatched job's status is polled
    pub poll_interval: Duration,
    /// Maximum lifetime of a dispatched job before its slot is reclaimed
    pub job_timeout: Duration,
    /// How long completion records are kept for dependencies and statistics
    pub completion_retention: Duration,
    /// How often the janitor prunes completion records
    pub cleanup_interval: Duration,
    /// Processing time assumed for entries without an estimate
    pub default_processing_estimate: Duration,
    /// Buffer size of the queue event channel
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            poll_interval: Duration::from_secs(1),
            job_timeout: Duration::from_secs(30 * 60), // 30 minutes
            completion_retention: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
            default_processing_estimate: Duration::from_secs(5 * 60),
            event_capacity: 256,
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent: env_parse("RENDER_QUEUE_MAX_CONCURRENT")
                .unwrap_or(defaults.max_concurrent)
                .max(1),
            poll_interval: env_parse("RENDER_QUEUE_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            job_timeout: env_parse("RENDER_QUEUE_JOB_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_timeout),
            completion_retention: env_parse("RENDER_QUEUE_RETENTION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.completion_retention),
            cleanup_interval: env_parse("RENDER_QUEUE_CLEANUP_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
            default_processing_estimate: env_parse("RENDER_QUEUE_DEFAULT_ESTIMATE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_processing_estimate),
            event_capacity: env_parse("RENDER_QUEUE_EVENT_CAPACITY")
                .unwrap_or(defaults.event_capacity)
                .max(1),
        }
    }

    /// Set the concurrency ceiling (minimum 1).
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Set the status polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the per-job timeout.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Set the completion record retention window.
    pub fn with_completion_retention(mut self, retention: Duration) -> Self {
        self.completion_retention = retention;
        self
    }

    /// Set the janitor period.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
