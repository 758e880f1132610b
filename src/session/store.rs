//! Client session id to agent session id mapping
//!
//! Backed by a bounded least-recently-used map. Entries are never removed by
//! age; only pressure beyond the capacity evicts the entry touched longest
//! ago. The agent backend keeps its transcripts in the same kind of map.

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Capacity used when none is configured
pub const DEFAULT_CAPACITY: usize = 1000;

/// A string-keyed map that keeps at most `capacity` entries.
///
/// Reads and writes both count as use. Each operation takes the lock once,
/// so concurrent writers see last-writer-wins per key.
#[derive(Debug)]
pub struct LruMap<V> {
    capacity: usize,
    // Oldest first; the last entry is the most recently used
    entries: Mutex<IndexMap<String, V>>,
}

impl<V: Clone> LruMap<V> {
    /// Create a map holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Clone of the value under `key`, refreshing its recency
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        let index = entries.get_index_of(key)?;
        let last = entries.len() - 1;
        entries.move_index(index, last);
        entries.get_index(last).map(|(_, v)| v.clone())
    }

    /// Insert or replace, evicting the least recently used entries beyond
    /// the capacity
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock();

        let (index, _) = entries.insert_full(key.into(), value);
        let last = entries.len() - 1;
        entries.move_index(index, last);

        while entries.len() > self.capacity {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                tracing::debug!("[LruMap] Evicted {}", evicted);
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.lock().shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<V: Clone> Default for LruMap<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Process-wide session continuity store
///
/// Shared between HTTP handlers behind an `Arc`.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: LruMap<String>,
}

impl SessionStore {
    /// Create a store holding at most `capacity` sessions (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: LruMap::new(capacity),
        }
    }

    /// Agent session id for a client session, refreshing its recency
    pub fn get(&self, client_session_id: &str) -> Option<String> {
        self.sessions.get(client_session_id)
    }

    /// Insert or update a mapping, evicting the least recently used entry
    /// when the store is over capacity
    pub fn set(&self, client_session_id: impl Into<String>, agent_session_id: impl Into<String>) {
        self.sessions.insert(client_session_id, agent_session_id.into());
    }

    /// Drop a mapping
    pub fn remove(&self, client_session_id: &str) -> Option<String> {
        self.sessions.remove(client_session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.sessions.capacity()
    }
}
