//! Pruning of old completion records.
//!
//! Completion records only serve dependency checks and the statistics
//! window, so dropping the ones older than the retention window is safe.
//! The queue store and the processing set are never touched here.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::state::QueueState;

/// Delete completion records at least `retention` old relative to `now`.
///
/// Returns the number of records removed.
pub(crate) fn prune_completions(state: &mut QueueState, now: DateTime<Utc>, retention: Duration) -> usize {
    let Some(cutoff) = chrono::Duration::from_std(retention)
        .ok()
        .and_then(|retention| now.checked_sub_signed(retention))
    else {
        return 0;
    };

    let before = state.completed.len();
    state.completed.retain(|_, record| record.completed_at > cutoff);
    before - state.completed.len()
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use render_queue_models::{JobId, Priority, QueueEntry, RenderJobStatus};

    use super::*;
    use crate::state::CompletionRecord;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn record(completed_at: DateTime<Utc>) -> CompletionRecord {
        CompletionRecord {
            completed_at,
            added_at: None,
            status: RenderJobStatus::Completed,
        }
    }

    #[test]
    fn test_prunes_only_old_records() {
        let now = Utc::now();
        let mut state = QueueState::new(1);
        state.completed.insert(JobId::from("fresh"), record(now - ChronoDuration::hours(23)));
        state.completed.insert(JobId::from("stale"), record(now - ChronoDuration::hours(25)));
        state.completed.insert(JobId::from("ancient"), record(now - ChronoDuration::days(7)));

        assert_eq!(prune_completions(&mut state, now, DAY), 2);
        assert!(state.is_completed(&JobId::from("fresh")));
        assert!(!state.is_completed(&JobId::from("stale")));
        assert_eq!(prune_completions(&mut state, now, DAY), 0);
    }

    #[test]
    fn test_record_at_retention_age_is_pruned() {
        let now = Utc::now();
        let mut state = QueueState::new(1);
        state.completed.insert(JobId::from("edge"), record(now - ChronoDuration::hours(24)));
        state.completed.insert(JobId::from("now"), record(now));

        assert_eq!(prune_completions(&mut state, now, DAY), 1);
        assert!(state.is_completed(&JobId::from("now")));
        // Zero retention expires everything stamped up to `now`.
        assert_eq!(prune_completions(&mut state, now, Duration::ZERO), 1);
        assert!(state.completed.is_empty());
    }

    #[test]
    fn test_pruning_leaves_queue_and_processing_alone() {
        let now = Utc::now();
        let mut state = QueueState::new(1);
        state.store.insert(QueueEntry::new("running", Priority::High));
        state.store.insert(
            QueueEntry::new("waiting", Priority::Normal).with_dependencies(vec![JobId::from("stale")]),
        );
        state.reserve_next().unwrap();
        state.completed.insert(JobId::from("stale"), record(now - ChronoDuration::hours(48)));

        let queued_before: Vec<_> = state.store.iter().map(|e| e.id.clone()).collect();
        let processing_before = state.processing_jobs();

        assert_eq!(prune_completions(&mut state, now, DAY), 1);

        let queued_after: Vec<_> = state.store.iter().map(|e| e.id.clone()).collect();
        assert_eq!(queued_before, queued_after);
        assert_eq!(processing_before, state.processing_jobs());
    }
}
