//! Actions history: the recent queries sent along with search requests.
//!
//! # Design
//! The store is an injected collaborator. `BoundedHistoryStore` keeps the
//! newest entries first behind a `parking_lot::Mutex`, so concurrent actions
//! can append without further coordination.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Name used for entries recorded by search actions.
pub const QUERY_ENTRY_NAME: &str = "Query";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub time: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn query(value: Option<&str>) -> Self {
        Self {
            name: QUERY_ENTRY_NAME.to_string(),
            value: value.map(str::to_string),
            time: Utc::now(),
        }
    }
}

pub trait HistoryStore: Send + Sync {
    fn add_element(&self, entry: HistoryEntry);

    /// Entries ordered newest first.
    fn get_history(&self) -> Vec<HistoryEntry>;
}

/// In-memory history with a fixed capacity; the oldest entry is evicted first.
#[derive(Debug)]
pub struct BoundedHistoryStore {
    capacity: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl BoundedHistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for BoundedHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// Same action repeated within a minute of the newest entry.
fn is_repeat(newest: &HistoryEntry, entry: &HistoryEntry) -> bool {
    newest.name == entry.name
        && newest.value == entry.value
        && entry.time - newest.time < Duration::minutes(1)
}

impl HistoryStore for BoundedHistoryStore {
    fn add_element(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock();
        if entries.front().is_some_and(|newest| is_repeat(newest, &entry)) {
            tracing::debug!(target: "search::history", name = %entry.name, "Skipping repeated entry");
            return;
        }
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    fn get_history(&self) -> Vec<HistoryEntry> {
        self.entries.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_at(value: &str, time: DateTime<Utc>) -> HistoryEntry {
        HistoryEntry {
            name: QUERY_ENTRY_NAME.to_string(),
            value: Some(value.to_string()),
            time,
        }
    }

    #[test]
    fn newest_entry_comes_first() {
        let store = BoundedHistoryStore::default();
        let now = Utc::now();
        store.add_element(entry_at("first", now));
        store.add_element(entry_at("second", now));
        let history = store.get_history();
        assert_eq!(history[0].value.as_deref(), Some("second"));
        assert_eq!(history[1].value.as_deref(), Some("first"));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let store = BoundedHistoryStore::new(3);
        let now = Utc::now();
        for i in 0..5 {
            store.add_element(entry_at(&format!("q{i}"), now));
        }
        let values: Vec<_> = store
            .get_history()
            .into_iter()
            .filter_map(|e| e.value)
            .collect();
        assert_eq!(values, vec!["q4", "q3", "q2"]);
    }

    #[test]
    fn repeated_entry_within_a_minute_is_dropped() {
        let store = BoundedHistoryStore::default();
        let now = Utc::now();
        store.add_element(entry_at("same", now));
        store.add_element(entry_at("same", now + Duration::seconds(10)));
        assert_eq!(store.len(), 1);

        store.add_element(entry_at("same", now + Duration::minutes(2)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn entry_without_value_omits_it_on_the_wire() {
        let entry = HistoryEntry::query(None);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["name"], "Query");
        assert!(json.get("value").is_none());
        assert!(json["time"].is_string());
    }

    #[test]
    fn concurrent_appends_are_all_recorded() {
        let store = std::sync::Arc::new(BoundedHistoryStore::new(100));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.add_element(entry_at(&format!("t{i}"), Utc::now())))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8);
    }
}
