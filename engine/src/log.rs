//! Persistent mutation log.
//!
//! The whole queue lives in a single durable slot as a JSON array of
//! [`PendingMutation`] and is always read and written as one unit. Entries
//! older than the staleness window are dropped whenever the queue is listed,
//! and the filtered queue is written back immediately so stale entries never
//! resurrect.
//!
//! Storage failures never propagate: an unreadable or corrupt slot reads as
//! an empty queue and a failed write is logged and ignored, leaving the
//! session to run purely in memory.

use crate::{clock::Clock, MutationId, PendingMutation};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::DurableStore;

/// Durable, append-only record of not-yet-confirmed mutations.
pub struct MutationLog {
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    key: String,
    max_age: Duration,
    /// Serializes read-modify-write cycles within this process.
    io: Mutex<()>,
}

impl MutationLog {
    /// Open the log stored under `key`, dropping stale entries right away.
    pub fn open(
        store: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
        max_age: Duration,
    ) -> Self {
        let log = Self {
            store,
            clock,
            key: key.into(),
            max_age,
            io: Mutex::new(()),
        };
        log.list();
        log
    }

    /// Append a mutation.
    pub fn append(&self, mutation: PendingMutation) {
        let _io = self.io.lock();
        let mut mutations = self.load_fresh();
        tracing::debug!(mutation_id = %mutation.id, kind = %mutation.kind, "Queued pending mutation");
        mutations.push(mutation);
        self.save(&mutations);
    }

    /// All mutations inside the staleness window, oldest first.
    ///
    /// Stale entries are removed from the durable slot as a side effect.
    pub fn list(&self) -> Vec<PendingMutation> {
        let _io = self.io.lock();
        let mutations = self.load_fresh();
        self.save(&mutations);
        mutations
    }

    /// Remove a mutation by id. Unknown ids are ignored.
    pub fn remove(&self, id: &str) {
        self.remove_many(&[id.to_string()]);
    }

    /// Remove several mutations in one write.
    pub fn remove_many(&self, ids: &[MutationId]) {
        let _io = self.io.lock();
        let mut mutations = self.load_fresh();
        mutations.retain(|m| !ids.contains(&m.id));
        self.save(&mutations);
    }

    /// Drop every queued mutation.
    pub fn clear(&self) {
        let _io = self.io.lock();
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!(key = %self.key, "Failed to clear mutation queue: {}", e);
        }
    }

    /// Number of mutations inside the staleness window.
    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load_fresh(&self) -> Vec<PendingMutation> {
        let raw = match self.store.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(key = %self.key, "Failed to read mutation queue: {}", e);
                return Vec::new();
            }
        };

        let mutations: Vec<PendingMutation> = match serde_json::from_str(&raw) {
            Ok(mutations) => mutations,
            Err(e) => {
                tracing::warn!(key = %self.key, "Discarding corrupt mutation queue: {}", e);
                return Vec::new();
            }
        };

        let now = self.clock.now();
        let max_age = self.max_age.as_millis() as u64;
        let before = mutations.len();
        let fresh: Vec<_> = mutations
            .into_iter()
            .filter(|m| m.age(now) < max_age)
            .collect();
        if fresh.len() != before {
            tracing::debug!(dropped = before - fresh.len(), "Dropped stale pending mutations");
        }
        fresh
    }

    fn save(&self, mutations: &[PendingMutation]) {
        let json = match serde_json::to_string(mutations) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(key = %self.key, "Failed to encode mutation queue: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.write(&self.key, &json) {
            tracing::warn!(key = %self.key, "Failed to save mutation queue: {}", e);
        }
    }
}
