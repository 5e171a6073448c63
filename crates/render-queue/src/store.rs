//! Priority-ordered queue store.
//!
//! Entries are kept sorted by `(priority desc, added_at asc)` at all times.
//! Order is maintained on insert; the store is never re-sorted wholesale.

use render_queue_models::{EntryId, QueueEntry};

#[derive(Debug, Default)]
pub struct QueueStore {
    entries: Vec<QueueEntry>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry` before the first entry it runs ahead of.
    ///
    /// Entries with equal priority and timestamp keep arrival order.
    pub fn insert(&mut self, entry: QueueEntry) -> usize {
        let index = self
            .entries
            .iter()
            .position(|existing| entry.runs_before(existing))
            .unwrap_or(self.entries.len());
        self.entries.insert(index, entry);
        index
    }

    /// Remove an entry by ID.
    pub fn remove(&mut self, entry_id: &EntryId) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| &e.id == entry_id)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, entry_id: &EntryId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| &e.id == entry_id)
    }

    /// 1-based rank of an entry among entries not excluded by `is_dispatched`.
    ///
    /// Returns `None` if the entry is absent or itself dispatched.
    pub fn position_of(&self, entry_id: &EntryId, is_dispatched: impl Fn(&QueueEntry) -> bool) -> Option<usize> {
        let mut rank = 0;
        for entry in self.entries.iter().filter(|e| !is_dispatched(e)) {
            rank += 1;
            if &entry.id == entry_id {
                return Some(rank);
            }
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Check the ordering invariant over every adjacent pair.
    pub fn is_ordered(&self) -> bool {
        self.entries.windows(2).all(|pair| {
            let (a, b) = (&pair[0], &pair[1]);
            a.priority > b.priority || (a.priority == b.priority && a.added_at <= b.added_at)
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use render_queue_models::Priority;

    use super::*;

    fn job_ids(store: &QueueStore) -> Vec<&str> {
        store.iter().map(|e| e.job_id.as_str()).collect()
    }

    #[test]
    fn test_insert_orders_by_priority() {
        let mut store = QueueStore::new();
        store.insert(QueueEntry::new("low", Priority::Low));
        store.insert(QueueEntry::new("urgent", Priority::Urgent));
        store.insert(QueueEntry::new("normal", Priority::Normal));
        store.insert(QueueEntry::new("high", Priority::High));

        assert_eq!(job_ids(&store), vec!["urgent", "high", "normal", "low"]);
        assert!(store.is_ordered());
    }

    #[test]
    fn test_fifo_within_band() {
        let mut store = QueueStore::new();
        let now = Utc::now();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            store.insert(QueueEntry::new(*name, Priority::Normal).with_added_at(now + Duration::milliseconds(i as i64)));
        }
        // Identical timestamps still keep arrival order.
        store.insert(QueueEntry::new("d", Priority::Normal).with_added_at(now + Duration::milliseconds(2)));

        assert_eq!(job_ids(&store), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_backdated_entry_slots_into_band() {
        let mut store = QueueStore::new();
        let now = Utc::now();
        store.insert(QueueEntry::new("first", Priority::High).with_added_at(now));
        store.insert(QueueEntry::new("third", Priority::High).with_added_at(now + Duration::seconds(2)));
        store.insert(QueueEntry::new("tail", Priority::Low).with_added_at(now));
        let index = store.insert(QueueEntry::new("second", Priority::High).with_added_at(now + Duration::seconds(1)));

        assert_eq!(index, 1);
        assert_eq!(job_ids(&store), vec!["first", "second", "third", "tail"]);
        assert!(store.is_ordered());
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut store = QueueStore::new();
        let entry = QueueEntry::new("job", Priority::Normal);
        let id = entry.id.clone();
        store.insert(entry);

        assert!(store.remove(&id).is_some());
        assert!(store.remove(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_position_skips_dispatched() {
        let mut store = QueueStore::new();
        let a = QueueEntry::new("a", Priority::Urgent);
        let b = QueueEntry::new("b", Priority::Normal);
        let c = QueueEntry::new("c", Priority::Low);
        let (a_id, b_id, c_id) = (a.id.clone(), b.id.clone(), c.id.clone());
        store.insert(a);
        store.insert(b);
        store.insert(c);

        let dispatched = |e: &QueueEntry| e.job_id.as_str() == "a";
        assert_eq!(store.position_of(&a_id, dispatched), None);
        assert_eq!(store.position_of(&b_id, dispatched), Some(1));
        assert_eq!(store.position_of(&c_id, dispatched), Some(2));
        assert_eq!(store.position_of(&EntryId::from_string("nope"), dispatched), None);
    }
}
