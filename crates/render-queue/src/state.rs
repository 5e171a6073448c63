//! Shared scheduler state.
//!
//! The queue store, the processing set and the completion map live together
//! in one [`QueueState`] guarded by a single mutex in the scheduler. Every
//! method here is synchronous; the lock is never held across an await.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;

use render_queue_models::{EntryId, JobId, PriorityBreakdown, QueueEntry, RenderJobStatus};

use crate::store::QueueStore;

/// A job currently holding a concurrency slot.
#[derive(Debug)]
pub(crate) struct Dispatch {
    pub entry_id: EntryId,
    pub generation: u64,
    pub monitor: Option<AbortHandle>,
}

impl Dispatch {
    fn abort_monitor(&self) {
        if let Some(handle) = &self.monitor {
            handle.abort();
        }
    }
}

/// A job that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub completed_at: DateTime<Utc>,
    /// Enqueue time of the entry, when known
    pub added_at: Option<DateTime<Utc>>,
    pub status: RenderJobStatus,
}

impl CompletionRecord {
    /// Enqueue-to-completion time, if the entry was resolvable.
    pub fn wait_time(&self) -> Option<chrono::Duration> {
        self.added_at.map(|added| self.completed_at - added)
    }
}

#[derive(Debug)]
pub(crate) struct QueueState {
    pub store: QueueStore,
    pub processing: HashMap<JobId, Dispatch>,
    pub completed: HashMap<JobId, CompletionRecord>,
    pub max_concurrent: usize,
    pub paused: bool,
    next_generation: u64,
}

impl QueueState {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            store: QueueStore::new(),
            processing: HashMap::new(),
            completed: HashMap::new(),
            max_concurrent: max_concurrent.max(1),
            paused: false,
            next_generation: 0,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.processing.len() < self.max_concurrent
    }

    pub fn is_dispatched(&self, entry: &QueueEntry) -> bool {
        self.processing.contains_key(&entry.job_id)
    }

    /// First entry that is not dispatched and whose dependencies completed.
    pub fn next_eligible(&self) -> Option<&QueueEntry> {
        self.store
            .iter()
            .find(|e| !self.is_dispatched(e) && e.dependencies_met(|dep| self.completed.contains_key(dep)))
    }

    /// Select the next eligible entry and claim a slot for it.
    ///
    /// Returns the entry and its dispatch generation, or `None` when paused,
    /// at capacity, or nothing is eligible.
    pub fn reserve_next(&mut self) -> Option<(QueueEntry, u64)> {
        if self.paused || !self.has_capacity() {
            return None;
        }
        let entry = self.next_eligible()?.clone();
        self.next_generation += 1;
        let generation = self.next_generation;
        self.processing.insert(
            entry.job_id.clone(),
            Dispatch {
                entry_id: entry.id.clone(),
                generation,
                monitor: None,
            },
        );
        Some((entry, generation))
    }

    /// Whether `generation` still owns the slot for `job_id`.
    pub fn owns_slot(&self, job_id: &JobId, generation: u64) -> bool {
        self.processing
            .get(job_id)
            .is_some_and(|d| d.generation == generation)
    }

    /// Attach the monitor task of a reserved dispatch.
    pub fn attach_monitor(&mut self, job_id: &JobId, generation: u64, handle: AbortHandle) -> bool {
        match self.processing.get_mut(job_id) {
            Some(dispatch) if dispatch.generation == generation => {
                dispatch.monitor = Some(handle);
                true
            }
            _ => {
                handle.abort();
                false
            }
        }
    }

    /// Free the slot held by `generation` and drop its entry from the store.
    ///
    /// Returns the removed entry, or `None` if the slot was already released
    /// (by removal, clear, or a newer dispatch of the same job).
    pub fn release(&mut self, job_id: &JobId, generation: u64) -> Option<QueueEntry> {
        if !self.owns_slot(job_id, generation) {
            return None;
        }
        let dispatch = self.processing.remove(job_id)?;
        self.store.remove(&dispatch.entry_id)
    }

    /// Release the slot and record the terminal status.
    pub fn finish(
        &mut self,
        job_id: &JobId,
        generation: u64,
        status: RenderJobStatus,
        now: DateTime<Utc>,
    ) -> Option<QueueEntry> {
        if !self.owns_slot(job_id, generation) {
            return None;
        }
        let entry = self.release(job_id, generation);
        self.completed.insert(
            job_id.clone(),
            CompletionRecord {
                completed_at: now,
                added_at: entry.as_ref().map(|e| e.added_at),
                status,
            },
        );
        entry
    }

    /// Remove an entry and, if it is the one running, its dispatch.
    pub fn remove_entry(&mut self, entry_id: &EntryId) -> Option<QueueEntry> {
        let entry = self.store.remove(entry_id)?;
        let owns_dispatch = self
            .processing
            .get(&entry.job_id)
            .is_some_and(|d| &d.entry_id == entry_id);
        if owns_dispatch {
            if let Some(dispatch) = self.processing.remove(&entry.job_id) {
                dispatch.abort_monitor();
            }
        }
        Some(entry)
    }

    /// Drop every entry and dispatch. Completion records are kept.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&mut self) -> usize {
        for dispatch in self.processing.values() {
            dispatch.abort_monitor();
        }
        let removed = self.store.len();
        self.processing.clear();
        self.store.clear();
        removed
    }

    pub fn is_completed(&self, job_id: &JobId) -> bool {
        self.completed.contains_key(job_id)
    }

    /// Entries with at least one dependency missing from the completion map.
    pub fn waiting_for_dependencies(&self) -> Vec<QueueEntry> {
        self.store
            .iter()
            .filter(|e| e.has_dependencies() && !e.dependencies_met(|dep| self.is_completed(dep)))
            .cloned()
            .collect()
    }

    /// Waiting entries per priority band.
    pub fn waiting_by_priority(&self) -> PriorityBreakdown {
        let mut breakdown = PriorityBreakdown::default();
        for entry in self.store.iter().filter(|e| !self.is_dispatched(e)) {
            breakdown.record(entry.priority);
        }
        breakdown
    }

    pub fn position_of(&self, entry_id: &EntryId) -> Option<usize> {
        self.store.position_of(entry_id, |e| self.is_dispatched(e))
    }

    pub fn processing_jobs(&self) -> Vec<JobId> {
        self.processing.keys().cloned().collect()
    }
}
