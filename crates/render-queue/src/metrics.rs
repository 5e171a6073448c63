//! Render queue metrics.
//!
//! Recorded through the `metrics` facade; the embedding process decides
//! which exporter (if any) is installed.

use metrics::{counter, gauge};

use render_queue_models::{Priority, PriorityBreakdown, RenderJobStatus};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    pub const JOBS_ENQUEUED_TOTAL: &str = "render_queue_jobs_enqueued_total";
    pub const JOBS_DISPATCHED_TOTAL: &str = "render_queue_jobs_dispatched_total";
    pub const JOBS_FINISHED_TOTAL: &str = "render_queue_jobs_finished_total";
    pub const JOBS_TIMED_OUT_TOTAL: &str = "render_queue_jobs_timed_out_total";
    pub const JOBS_DISCARDED_TOTAL: &str = "render_queue_jobs_discarded_total";
    pub const JOBS_REMOVED_TOTAL: &str = "render_queue_jobs_removed_total";
    pub const COMPLETIONS_PRUNED_TOTAL: &str = "render_queue_completions_pruned_total";

    /// Entries in the queue, waiting or processing.
    pub const QUEUE_DEPTH: &str = "render_queue_depth";
    /// Entries holding a concurrency slot.
    pub const PROCESSING_JOBS: &str = "render_queue_processing_jobs";
    /// Entries not yet dispatched, labelled by priority.
    pub const WAITING_JOBS: &str = "render_queue_waiting_jobs";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_enqueued(priority: Priority) {
    counter!(names::JOBS_ENQUEUED_TOTAL, "priority" => priority.as_str()).increment(1);
}

pub fn record_dispatched() {
    counter!(names::JOBS_DISPATCHED_TOTAL).increment(1);
}

pub fn record_finished(status: RenderJobStatus) {
    counter!(names::JOBS_FINISHED_TOTAL, "status" => status.as_str()).increment(1);
}

pub fn record_timed_out() {
    counter!(names::JOBS_TIMED_OUT_TOTAL).increment(1);
}

/// `reason` is one of `not_found`, `provider_error`, `vanished`.
pub fn record_discarded(reason: &'static str) {
    counter!(names::JOBS_DISCARDED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_removed() {
    counter!(names::JOBS_REMOVED_TOTAL).increment(1);
}

pub fn record_pruned(count: usize) {
    counter!(names::COMPLETIONS_PRUNED_TOTAL).increment(count as u64);
}

pub fn record_depth(total: usize, processing: usize) {
    gauge!(names::QUEUE_DEPTH).set(total as f64);
    gauge!(names::PROCESSING_JOBS).set(processing as f64);
}

pub fn record_waiting(breakdown: &PriorityBreakdown) {
    for priority in Priority::ALL {
        gauge!(names::WAITING_JOBS, "priority" => priority.as_str()).set(breakdown.get(priority) as f64);
    }
}
