//! Queue statistics.
//!
//! Everything is computed fresh from the current state on each call.

use std::time::Duration;

use chrono::{DateTime, Utc};

use render_queue_models::{EntryId, QueueStats};

use crate::state::QueueState;

const MS_PER_HOUR: f64 = 60.0 * 60.0 * 1000.0;
const MS_PER_DAY: f64 = 24.0 * MS_PER_HOUR;

/// Compute queue statistics over the trailing `window` ending at `now`.
pub(crate) fn queue_stats(state: &QueueState, now: DateTime<Utc>, window: Duration) -> QueueStats {
    let cutoff = chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let recent: Vec<_> = state
        .completed
        .values()
        .filter(|record| record.completed_at >= cutoff)
        .collect();

    let waits: Vec<f64> = recent
        .iter()
        .filter_map(|record| record.wait_time())
        .map(|wait| wait.num_milliseconds() as f64)
        .collect();
    let average_wait_time_ms = if waits.is_empty() {
        0.0
    } else {
        waits.iter().sum::<f64>() / waits.len() as f64
    };

    let throughput = recent.len() as f64 * (MS_PER_HOUR / MS_PER_DAY);

    let total_jobs = state.store.len();
    let processing_jobs = state.processing.len();

    QueueStats {
        total_jobs,
        processing_jobs,
        waiting_jobs: total_jobs.saturating_sub(processing_jobs),
        average_wait_time_ms,
        throughput,
        queue_by_priority: state.waiting_by_priority(),
    }
}

/// Estimated wait before `entry_id` is dispatched.
///
/// Sums the processing estimates of waiting entries ranked ahead of it and
/// spreads them over the concurrency ceiling. Unknown entries wait zero.
pub(crate) fn estimated_wait_time(state: &QueueState, entry_id: &EntryId, default_estimate: Duration) -> Duration {
    let Some(index) = state.store.iter().position(|e| &e.id == entry_id) else {
        return Duration::ZERO;
    };

    let ahead: Duration = state.store.entries()[..index]
        .iter()
        .filter(|e| !state.is_dispatched(e))
        .map(|e| e.estimated_processing_time.unwrap_or(default_estimate))
        .fold(Duration::ZERO, Duration::saturating_add);

    ahead / state.max_concurrent.max(1) as u32
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use render_queue_models::{JobId, Priority, QueueEntry, RenderJobStatus};

    use super::*;
    use crate::state::CompletionRecord;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn completion(completed_at: DateTime<Utc>, wait_ms: Option<i64>) -> CompletionRecord {
        CompletionRecord {
            completed_at,
            added_at: wait_ms.map(|ms| completed_at - ChronoDuration::milliseconds(ms)),
            status: RenderJobStatus::Completed,
        }
    }

    #[test]
    fn test_average_wait_and_throughput() {
        let now = Utc::now();
        let mut state = QueueState::new(3);
        state.completed.insert(JobId::from("a"), completion(now - ChronoDuration::hours(1), Some(60_000)));
        state.completed.insert(JobId::from("b"), completion(now - ChronoDuration::hours(2), Some(180_000)));
        state.completed.insert(JobId::from("c"), completion(now - ChronoDuration::hours(3), Some(120_000)));
        // Outside the window: ignored for both figures.
        state.completed.insert(JobId::from("old"), completion(now - ChronoDuration::hours(30), Some(1_000_000)));

        let stats = queue_stats(&state, now, DAY);
        assert_eq!(stats.average_wait_time_ms, 120_000.0);
        assert!((stats.throughput - 3.0 / 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_unresolvable_completions_excluded_from_average() {
        let now = Utc::now();
        let mut state = QueueState::new(1);
        state.completed.insert(JobId::from("a"), completion(now, Some(10_000)));
        state.completed.insert(JobId::from("b"), completion(now, None));

        let stats = queue_stats(&state, now, DAY);
        assert_eq!(stats.average_wait_time_ms, 10_000.0);
        // Still counted as throughput.
        assert!((stats.throughput - 2.0 / 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_counts_and_breakdown() {
        let mut state = QueueState::new(1);
        state.store.insert(QueueEntry::new("u", Priority::Urgent));
        state.store.insert(QueueEntry::new("n1", Priority::Normal));
        state.store.insert(QueueEntry::new("n2", Priority::Normal));
        state.store.insert(QueueEntry::new("l", Priority::Low));
        state.reserve_next().unwrap();

        let stats = queue_stats(&state, Utc::now(), DAY);
        assert_eq!(stats.total_jobs, 4);
        assert_eq!(stats.processing_jobs, 1);
        assert_eq!(stats.waiting_jobs, 3);
        assert_eq!(stats.queue_by_priority.urgent, 0);
        assert_eq!(stats.queue_by_priority.normal, 2);
        assert_eq!(stats.queue_by_priority.low, 1);
        assert_eq!(stats.average_wait_time_ms, 0.0);
        assert_eq!(stats.throughput, 0.0);
    }

    #[test]
    fn test_estimated_wait_time() {
        let default = Duration::from_secs(300);
        let mut state = QueueState::new(2);
        let running = QueueEntry::new("running", Priority::Urgent).with_estimate(Some(Duration::from_secs(999)));
        let hinted = QueueEntry::new("hinted", Priority::High).with_estimate(Some(Duration::from_secs(60)));
        let unhinted = QueueEntry::new("unhinted", Priority::Normal);
        let target = QueueEntry::new("target", Priority::Low);
        let target_id = target.id.clone();
        for entry in [running, hinted, unhinted, target] {
            state.store.insert(entry);
        }
        state.reserve_next().unwrap();

        // (60s + 300s) / 2; the dispatched entry is not waiting.
        assert_eq!(estimated_wait_time(&state, &target_id, default), Duration::from_secs(180));
        assert_eq!(
            estimated_wait_time(&state, &EntryId::from_string("missing"), default),
            Duration::ZERO
        );
    }

    #[test]
    fn test_estimated_wait_time_saturates() {
        let mut state = QueueState::new(2);
        state.store.insert(QueueEntry::new("a", Priority::High).with_estimate(Some(Duration::MAX)));
        state.store.insert(QueueEntry::new("b", Priority::High).with_estimate(Some(Duration::MAX)));
        let target = QueueEntry::new("c", Priority::Low);
        let target_id = target.id.clone();
        state.store.insert(target);

        let wait = estimated_wait_time(&state, &target_id, Duration::from_secs(300));
        assert_eq!(wait, Duration::MAX / 2);
    }
}
