//! Render queue scheduler.
//!
//! [`RenderQueue`] decides which queued render jobs may run now. Dispatch is
//! cooperative: every state change (add, remove, completion, timeout, limit
//! change, resume) runs the dispatcher inline, and the only timers are the
//! per-job completion monitors and the janitor.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tracing::{info, warn, Instrument};

use render_queue_models::{EntryId, JobId, Priority, QueueEntry, QueueStats};

use crate::config::SchedulerConfig;
use crate::error::{QueueError, QueueResult};
use crate::events::{EventChannel, QueueEvent};
use crate::janitor::prune_completions;
use crate::logging::JobLogger;
use crate::metrics;
use crate::monitor::{self, MonitorOutcome};
use crate::provider::JobRecordProvider;
use crate::state::{CompletionRecord, QueueState};
use crate::stats;
use crate::ticker::RepeatingTask;

/// Boxed so monitor tasks can await the dispatcher that spawned them.
type DispatchFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

struct Inner {
    state: Mutex<QueueState>,
    provider: Arc<dyn JobRecordProvider>,
    config: SchedulerConfig,
    events: EventChannel,
    shutdown: watch::Sender<bool>,
}

fn record_depth(state: &QueueState) {
    metrics::record_depth(state.store.len(), state.processing.len());
    metrics::record_waiting(&state.waiting_by_priority());
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process render job scheduler.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct RenderQueue {
    inner: Arc<Inner>,
}

impl RenderQueue {
    /// Create a scheduler reading job status from `provider`.
    pub fn new(provider: Arc<dyn JobRecordProvider>, config: SchedulerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::new(config.max_concurrent)),
                provider,
                events: EventChannel::new(config.event_capacity),
                config,
                shutdown,
            }),
        }
    }

    /// Create a scheduler configured from environment variables.
    pub fn from_env(provider: Arc<dyn JobRecordProvider>) -> Self {
        Self::new(provider, SchedulerConfig::from_env())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Enqueue a render job and run the dispatcher.
    pub async fn add_job(
        &self,
        job_id: impl Into<JobId>,
        priority: Priority,
        estimated_processing_time: Option<Duration>,
        dependencies: Vec<JobId>,
    ) -> QueueEntry {
        let entry = QueueEntry::new(job_id, priority)
            .with_estimate(estimated_processing_time)
            .with_dependencies(dependencies);
        self.enqueue(entry).await
    }

    /// Enqueue a prepared entry and run the dispatcher.
    pub async fn enqueue(&self, entry: QueueEntry) -> QueueEntry {
        let position = {
            let mut state = self.inner.lock_state();
            state.store.insert(entry.clone());
            record_depth(&state);
            state.position_of(&entry.id)
        };

        info!(
            job_id = %entry.job_id,
            entry_id = %entry.id,
            priority = %entry.priority,
            queue_position = ?position,
            "Job added to render queue"
        );
        metrics::record_enqueued(entry.priority);
        self.inner.events.publish(QueueEvent::Enqueued {
            entry_id: entry.id.clone(),
            job_id: entry.job_id.clone(),
            priority: entry.priority,
            position,
        });

        self.try_dispatch().await;
        entry
    }

    /// Remove an entry, waiting or dispatched.
    ///
    /// A dispatched job is not told to stop; the scheduler only drops its
    /// bookkeeping and frees the slot. Returns false if the entry is unknown.
    pub async fn remove_job(&self, entry_id: &EntryId) -> bool {
        let removed = {
            let mut state = self.inner.lock_state();
            let removed = state.remove_entry(entry_id);
            record_depth(&state);
            removed
        };

        let Some(entry) = removed else {
            return false;
        };

        info!(job_id = %entry.job_id, entry_id = %entry.id, "Job removed from render queue");
        metrics::record_removed();
        self.inner.events.publish(QueueEvent::Removed {
            entry_id: entry.id,
            job_id: entry.job_id,
        });

        self.try_dispatch().await;
        true
    }

    /// Look up an entry, waiting or dispatched.
    pub fn entry(&self, entry_id: &EntryId) -> QueueResult<QueueEntry> {
        self.inner
            .lock_state()
            .store
            .get(entry_id)
            .cloned()
            .ok_or_else(|| QueueError::EntryNotFound(entry_id.clone()))
    }

    /// 1-based rank among entries still waiting; `None` if absent or dispatched.
    pub fn position_of(&self, entry_id: &EntryId) -> Option<usize> {
        self.inner.lock_state().position_of(entry_id)
    }

    pub fn queue_status(&self) -> QueueStats {
        let state = self.inner.lock_state();
        stats::queue_stats(&state, Utc::now(), self.inner.config.completion_retention)
    }

    pub fn estimated_wait_time(&self, entry_id: &EntryId) -> Duration {
        let state = self.inner.lock_state();
        stats::estimated_wait_time(&state, entry_id, self.inner.config.default_processing_estimate)
    }

    /// Queued entries with at least one dependency not yet completed.
    pub fn jobs_waiting_for_dependencies(&self) -> Vec<QueueEntry> {
        self.inner.lock_state().waiting_for_dependencies()
    }

    /// Snapshot of the whole queue in dispatch order.
    pub fn all_jobs(&self) -> Vec<QueueEntry> {
        self.inner.lock_state().store.entries().to_vec()
    }

    /// Render jobs currently holding a slot.
    pub fn processing_jobs(&self) -> Vec<JobId> {
        self.inner.lock_state().processing_jobs()
    }

    /// Whether a completion is on record for `job_id`.
    pub fn is_completed(&self, job_id: &JobId) -> bool {
        self.inner.lock_state().is_completed(job_id)
    }

    pub fn completion_record(&self, job_id: &JobId) -> Option<CompletionRecord> {
        self.inner.lock_state().completed.get(job_id).cloned()
    }

    /// Change the concurrency ceiling (minimum 1) and run the dispatcher.
    ///
    /// Lowering the ceiling never preempts running jobs.
    pub async fn set_max_concurrent(&self, max_concurrent: usize) {
        let max_concurrent = max_concurrent.max(1);
        self.inner.lock_state().max_concurrent = max_concurrent;
        info!(max_concurrent, "Queue max concurrent jobs updated");
        self.try_dispatch().await;
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.lock_state().max_concurrent
    }

    /// Stop dispatching new jobs. Running jobs keep being monitored.
    pub fn pause(&self) {
        self.inner.lock_state().paused = true;
        info!("Queue processing paused");
    }

    /// Resume dispatching and fill any free slots.
    ///
    /// Has no effect after [`shutdown`](Self::shutdown).
    pub async fn resume(&self) {
        if self.is_shut_down() {
            warn!("Ignoring resume of a shut down render queue");
            return;
        }
        self.inner.lock_state().paused = false;
        info!("Queue processing resumed");
        self.try_dispatch().await;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock_state().paused
    }

    /// Emergency stop: drop every entry and dispatch without recording
    /// completions. Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut state = self.inner.lock_state();
            let removed = state.clear();
            record_depth(&state);
            removed
        };

        warn!(removed, "Queue cleared - all jobs removed");
        self.inner.events.publish(QueueEvent::Cleared { removed });
        removed
    }

    /// Run one janitor pass. Returns the number of pruned completion records.
    pub fn cleanup(&self) -> usize {
        let removed = prune_completions(
            &mut self.inner.lock_state(),
            Utc::now(),
            self.inner.config.completion_retention,
        );

        if removed > 0 {
            info!(removed, "Cleaned up old completed job records");
            metrics::record_pruned(removed);
            self.inner.events.publish(QueueEvent::Pruned { removed });
        }
        removed
    }

    /// Run [`cleanup`](Self::cleanup) every `cleanup_interval` until the
    /// returned handle is stopped or dropped.
    pub fn start_janitor(&self) -> RepeatingTask {
        let queue = self.clone();
        RepeatingTask::spawn("render-queue-janitor", self.inner.config.cleanup_interval, move || {
            let queue = queue.clone();
            async move {
                queue.cleanup();
            }
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    /// Stop dispatching and stop every completion monitor, for good.
    ///
    /// Jobs still holding a slot keep it; their outcome is no longer tracked.
    pub fn shutdown(&self) {
        self.inner.lock_state().paused = true;
        // Stored even with no monitor subscribed yet.
        self.inner.shutdown.send_replace(true);
        info!("Render queue shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Dispatch eligible entries until no slot is free or nothing is eligible.
    ///
    /// Idempotent; safe to call redundantly.
    pub async fn try_dispatch(&self) {
        self.dispatch_pending().await;
    }

    fn dispatch_pending(&self) -> DispatchFuture {
        let queue = self.clone();
        Box::pin(async move {
            loop {
                let reserved = {
                    let mut state = queue.inner.lock_state();
                    state.reserve_next()
                };
                let Some((entry, generation)) = reserved else {
                    break;
                };

                // A hung lookup must not hold the slot, or the caller, forever.
                let limit = queue.inner.config.job_timeout;
                let lookup = timeout(limit, queue.inner.provider.get_job(&entry.job_id)).await;
                match lookup {
                    Ok(Ok(Some(_))) => queue.launch(entry, generation),
                    Ok(Ok(None)) => {
                        let err = QueueError::JobNotFound(entry.job_id.clone());
                        queue.discard(&entry, generation, "not_found", &err);
                    }
                    Ok(Err(err)) => queue.discard(&entry, generation, "provider_error", &err),
                    Err(_) => {
                        let err = QueueError::timeout(&entry.job_id, limit);
                        queue.discard(&entry, generation, "provider_error", &err);
                    }
                }
            }
        })
    }

    /// Start monitoring a reserved entry.
    fn launch(&self, entry: QueueEntry, generation: u64) {
        let logger = JobLogger::new(&entry.job_id, &entry.id);
        let mut state = self.inner.lock_state();

        // Removed or cleared while the provider was being asked.
        if !state.owns_slot(&entry.job_id, generation) {
            return;
        }

        let job_id = entry.job_id.clone();
        let entry_id = entry.id.clone();
        let span = logger.create_span();
        let queue = self.clone();
        let handle = tokio::spawn(queue.monitor(entry, generation, logger.clone()).instrument(span));
        state.attach_monitor(&job_id, generation, handle.abort_handle());
        record_depth(&state);
        drop(state);

        logger.log_dispatch();
        metrics::record_dispatched();
        self.inner.events.publish(QueueEvent::Dispatched { entry_id, job_id });
    }

    /// Drop an entry whose job could not be launched and free its slot.
    fn discard(&self, entry: &QueueEntry, generation: u64, reason: &'static str, err: &QueueError) {
        let released = {
            let mut state = self.inner.lock_state();
            let released = state.release(&entry.job_id, generation).is_some();
            record_depth(&state);
            released
        };
        if !released {
            return;
        }

        JobLogger::new(&entry.job_id, &entry.id).log_discarded(&err.to_string());
        metrics::record_discarded(reason);
        self.inner.events.publish(QueueEvent::Discarded {
            entry_id: entry.id.clone(),
            job_id: entry.job_id.clone(),
            reason: err.to_string(),
        });
    }

    async fn monitor(self, entry: QueueEntry, generation: u64, logger: JobLogger) {
        let mut shutdown = self.inner.shutdown.subscribe();
        let outcome = monitor::watch_job(
            self.inner.provider.as_ref(),
            &entry.job_id,
            self.inner.config.poll_interval,
            self.inner.config.job_timeout,
            &mut shutdown,
            &logger,
        )
        .await;

        if self.settle(&entry, generation, outcome, &logger) {
            self.dispatch_pending().await;
        }
    }

    /// Apply a monitor outcome. Returns true if a slot was freed.
    fn settle(&self, entry: &QueueEntry, generation: u64, outcome: MonitorOutcome, logger: &JobLogger) -> bool {
        let event = {
            let mut state = self.inner.lock_state();
            if !state.owns_slot(&entry.job_id, generation) {
                return false;
            }

            let event = match outcome {
                MonitorOutcome::Finished(status) => {
                    state.finish(&entry.job_id, generation, status, Utc::now());
                    logger.log_finished(status.as_str());
                    metrics::record_finished(status);
                    QueueEvent::Finished {
                        entry_id: entry.id.clone(),
                        job_id: entry.job_id.clone(),
                        status,
                    }
                }
                MonitorOutcome::TimedOut => {
                    state.release(&entry.job_id, generation);
                    let err = monitor::timeout_error(&entry.job_id, self.inner.config.job_timeout);
                    logger.log_timeout(&err.to_string());
                    metrics::record_timed_out();
                    QueueEvent::TimedOut {
                        entry_id: entry.id.clone(),
                        job_id: entry.job_id.clone(),
                    }
                }
                MonitorOutcome::Vanished => {
                    state.release(&entry.job_id, generation);
                    let err = QueueError::JobNotFound(entry.job_id.clone());
                    logger.log_discarded(&err.to_string());
                    metrics::record_discarded("vanished");
                    QueueEvent::Discarded {
                        entry_id: entry.id.clone(),
                        job_id: entry.job_id.clone(),
                        reason: err.to_string(),
                    }
                }
                MonitorOutcome::Shutdown => return false,
            };

            record_depth(&state);
            event
        };

        self.inner.events.publish(event);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ::metrics::{Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};

    use super::*;
    use crate::metrics::names;
    use crate::provider::InMemoryJobProvider;

    type Gauges = Arc<Mutex<HashMap<String, f64>>>;

    struct CapturedGauge {
        key: String,
        gauges: Gauges,
    }

    impl GaugeFn for CapturedGauge {
        fn increment(&self, value: f64) {
            *self.gauges.lock().unwrap().entry(self.key.clone()).or_default() += value;
        }

        fn decrement(&self, value: f64) {
            *self.gauges.lock().unwrap().entry(self.key.clone()).or_default() -= value;
        }

        fn set(&self, value: f64) {
            self.gauges.lock().unwrap().insert(self.key.clone(), value);
        }
    }

    /// Keeps the last value of every gauge, keyed by name and labels.
    #[derive(Default)]
    struct GaugeRecorder {
        gauges: Gauges,
    }

    impl Recorder for GaugeRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
            let mut id = key.name().to_string();
            for label in key.labels() {
                id.push_str(&format!(",{}={}", label.key(), label.value()));
            }
            Gauge::from_arc(Arc::new(CapturedGauge {
                key: id,
                gauges: Arc::clone(&self.gauges),
            }))
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_dispatch_refreshes_depth_gauges() {
        let recorder = GaugeRecorder::default();
        let gauges = Arc::clone(&recorder.gauges);

        ::metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .unwrap();

            runtime.block_on(async {
                let provider = Arc::new(InMemoryJobProvider::new());
                provider.register("a");
                provider.register("b");
                let queue = RenderQueue::new(provider, SchedulerConfig::default().with_max_concurrent(1));

                queue.add_job("a", Priority::Normal, None, vec![]).await;
                {
                    let gauges = gauges.lock().unwrap();
                    assert_eq!(gauges[names::QUEUE_DEPTH], 1.0);
                    assert_eq!(gauges[names::PROCESSING_JOBS], 1.0);
                    assert_eq!(gauges["render_queue_waiting_jobs,priority=normal"], 0.0);
                }

                queue.add_job("b", Priority::Low, None, vec![]).await;
                {
                    let gauges = gauges.lock().unwrap();
                    assert_eq!(gauges[names::QUEUE_DEPTH], 2.0);
                    assert_eq!(gauges[names::PROCESSING_JOBS], 1.0);
                    assert_eq!(gauges["render_queue_waiting_jobs,priority=low"], 1.0);
                }

                queue.shutdown();
            });
        });
    }
}
