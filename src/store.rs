//! The temporal store: current value + ordered change history per key.
//!
//! Every write appends a change; nothing is ever overwritten or deleted.
//! The current value for a key is always the content of its most recent
//! change. History reads return the most recent changes first.
//!
//! # Thread safety
//!
//! The current-value map is a `DashMap`, which internally shards its
//! entries behind per-shard reader-writer locks — this gives single
//! writer / multiple readers semantics over the map's structure. Each
//! key's history additionally sits behind its own `RwLock<Vec<Change>>`
//! so that appending to one key's history never blocks a reader of
//! another key's history.
use crate::error::{AgramaError, AgramaResult};
use crate::types::{next_timestamp, Change, Key, Metadata};
use dashmap::DashMap;
use std::sync::RwLock;
use tracing::{debug, trace};

/// Thread-safe temporal key/value store with append-only history.
#[derive(Debug, Default)]
pub struct TemporalStore {
    /// Most recent change for each key.
    current: DashMap<Key, Change>,
    /// Complete history for each key, oldest first.
    history: DashMap<Key, RwLock<Vec<Change>>>,
}

impl TemporalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change for `key` and make it the current value.
    ///
    /// History is append-only by contract: saving identical content still
    /// records a new change.
    pub fn save(
        &self,
        key: impl Into<String>,
        content: Vec<u8>,
        author: impl Into<String>,
    ) -> AgramaResult<Change> {
        let key = key.into();
        let change = Change::new(key.clone(), next_timestamp(), content, author);

        self.history
            .entry(key.clone())
            .or_insert_with(|| RwLock::new(Vec::new()))
            .write()
            .map_err(|_| AgramaError::internal("history lock poisoned"))?
            .push(change.clone());

        debug!(key = %key, timestamp = change.timestamp, bytes = change.content.len(), "store save");
        self.current.insert(key, change.clone());
        Ok(change)
    }

    /// Same as [`save`](Self::save) but also records metadata on the change.
    pub fn save_with_metadata(
        &self,
        key: impl Into<String>,
        content: Vec<u8>,
        author: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> AgramaResult<Change> {
        let key = key.into();
        let mut change = Change::new(key.clone(), next_timestamp(), content, author);
        change.metadata = metadata;

        self.history
            .entry(key.clone())
            .or_insert_with(|| RwLock::new(Vec::new()))
            .write()
            .map_err(|_| AgramaError::internal("history lock poisoned"))?
            .push(change.clone());

        self.current.insert(key, change.clone());
        Ok(change)
    }

    /// Get the current value for a key.
    pub fn get_current(&self, key: &str) -> AgramaResult<Vec<u8>> {
        trace!(key, "store get_current");
        self.current
            .get(key)
            .map(|c| c.content.clone())
            .ok_or_else(|| AgramaError::not_found("key", key))
    }

    /// Get the current change record (content + author + timestamp) for a key.
    pub fn get_current_change(&self, key: &str) -> AgramaResult<Change> {
        self.current
            .get(key)
            .map(|c| c.clone())
            .ok_or_else(|| AgramaError::not_found("key", key))
    }

    /// Get up to `limit` most recent changes for a key, newest first.
    ///
    /// Returns an empty vector if the key is absent. Fails with
    /// `InvalidArgument` if `limit == 0`.
    pub fn get_history(&self, key: &str, limit: usize) -> AgramaResult<Vec<Change>> {
        if limit == 0 {
            return Err(AgramaError::invalid("history limit must be >= 1"));
        }

        let Some(entry) = self.history.get(key) else {
            return Ok(Vec::new());
        };

        let guard = entry
            .read()
            .map_err(|_| AgramaError::internal("history lock poisoned"))?;

        Ok(guard.iter().rev().take(limit).cloned().collect())
    }

    /// Whether a key has ever been written.
    pub fn contains_key(&self, key: &str) -> bool {
        self.current.contains_key(key)
    }

    /// Number of distinct keys currently tracked.
    pub fn key_count(&self) -> usize {
        self.current.len()
    }

    /// Total number of changes across all keys.
    pub fn total_change_count(&self) -> usize {
        self.history
            .iter()
            .map(|entry| entry.value().read().map(|v| v.len()).unwrap_or(0))
            .sum()
    }

    /// An opaque, point-in-time iterable over `(key, current_value)`.
    ///
    /// Only consistent with respect to concurrent writes if the caller
    /// holds no concurrent writers — this mirrors the spec's contract
    /// exactly; it is intended for maintenance tasks, not for serving
    /// reads under load.
    pub fn snapshot(&self) -> Vec<(Key, Vec<u8>)> {
        self.current
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().content.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_retrieve_roundtrips() {
        let store = TemporalStore::new();
        store.save("a.ts", b"function f(){}".to_vec(), "agent-1").unwrap();
        let content = store.get_current("a.ts").unwrap();
        assert_eq!(content, b"function f(){}");
    }

    #[test]
    fn history_is_newest_first_and_bounded() {
        let store = TemporalStore::new();
        store.save("a.ts", b"v1".to_vec(), "a").unwrap();
        store.save("a.ts", b"v2".to_vec(), "a").unwrap();
        store.save("a.ts", b"v3".to_vec(), "a").unwrap();

        let history = store.get_history("a.ts", 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, b"v3");
        assert_eq!(history[1].content, b"v2");

        // strictly decreasing timestamps
        assert!(history[0].timestamp > history[1].timestamp);
    }

    #[test]
    fn history_limit_zero_is_invalid() {
        let store = TemporalStore::new();
        store.save("a.ts", b"v1".to_vec(), "a").unwrap();
        assert!(matches!(
            store.get_history("a.ts", 0),
            Err(AgramaError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn history_of_absent_key_is_empty() {
        let store = TemporalStore::new();
        assert_eq!(store.get_history("missing", 10).unwrap(), Vec::new());
    }

    #[test]
    fn get_current_missing_key_is_not_found() {
        let store = TemporalStore::new();
        assert!(matches!(
            store.get_current("missing"),
            Err(AgramaError::NotFound { .. })
        ));
    }

    #[test]
    fn identical_content_still_appends() {
        let store = TemporalStore::new();
        store.save("k", b"same".to_vec(), "a").unwrap();
        store.save("k", b"same".to_vec(), "a").unwrap();
        assert_eq!(store.get_history("k", 10).unwrap().len(), 2);
    }

    #[test]
    fn concurrent_writes_to_distinct_keys() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(TemporalStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .save(format!("key{i}"), format!("v{i}").into_bytes(), "a")
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.key_count(), 16);
    }
}
