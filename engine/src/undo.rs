//! Timed undo registry.
//!
//! Each operation registered with [`UndoRegistry::start`] owns a one-shot
//! timer task. When the window elapses the operation leaves the registry and
//! its commit future runs exactly once. [`UndoRegistry::cancel`] removes the
//! operation and aborts the timer before it can fire.
//!
//! Per operation the lifecycle is `pending -> expired-and-committed` or
//! `pending -> cancelled`; both are terminal. Starting an id that is still
//! pending cancels the earlier timer first, so an id never has two live
//! timers and never commits twice.
//!
//! Whichever side removes the entry from the map under the registry lock
//! wins: a timer that wakes up to find its entry gone (or replaced by a newer
//! generation) does nothing.

use crate::{clock::Clock, Entity, OperationId, Timestamp};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A reversible destructive operation waiting for its commit.
#[derive(Debug)]
struct UndoOperation {
    /// Full copies of the affected entities
    snapshot: Vec<Entity>,
    /// When the commit fires (milliseconds since epoch)
    expires_at: Timestamp,
    /// Distinguishes this registration from earlier ones with the same id
    generation: u64,
    /// The scheduled commit
    timer: JoinHandle<()>,
}

/// Read-only view of a pending operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUndo {
    pub id: OperationId,
    pub snapshot: Vec<Entity>,
    pub expires_at: Timestamp,
}

/// Registry of in-flight reversible operations.
pub struct UndoRegistry {
    window: Duration,
    clock: Arc<dyn Clock>,
    operations: Arc<Mutex<HashMap<OperationId, UndoOperation>>>,
    next_generation: AtomicU64,
}

impl UndoRegistry {
    /// Create a registry whose operations commit after `window`.
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            operations: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Register `operation_id`, committing via `on_expire` once the window
    /// elapses unless cancelled first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<F, Fut>(&self, operation_id: impl Into<OperationId>, snapshot: Vec<Entity>, on_expire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let operation_id = operation_id.into();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let expires_at = self.clock.now() + self.window.as_millis() as u64;

        // The map lock is held until the entry is inserted, so the timer can
        // never observe the map before its own registration.
        let mut operations = self.operations.lock();
        if let Some(previous) = operations.remove(&operation_id) {
            previous.timer.abort();
            tracing::debug!(operation_id = %operation_id, "Replaced pending undo operation");
        }

        let timer = tokio::spawn(expire(
            self.operations.clone(),
            operation_id.clone(),
            generation,
            self.window,
            on_expire,
        ));

        tracing::debug!(
            operation_id = %operation_id,
            entities = snapshot.len(),
            expires_at,
            "Started undo window"
        );
        operations.insert(
            operation_id,
            UndoOperation {
                snapshot,
                expires_at,
                generation,
                timer,
            },
        );
    }

    /// Cancel a pending operation without committing it.
    ///
    /// Returns the snapshot if the operation was still pending; cancelling an
    /// unknown, expired or already cancelled id returns `None`.
    pub fn cancel(&self, operation_id: &str) -> Option<Vec<Entity>> {
        let operation = self.operations.lock().remove(operation_id)?;
        operation.timer.abort();
        tracing::debug!(operation_id = %operation_id, "Cancelled undo operation");
        Some(operation.snapshot)
    }

    /// Cancel every pending operation without committing any.
    pub fn clear_all(&self) {
        let drained: Vec<_> = self.operations.lock().drain().collect();
        for (_, operation) in &drained {
            operation.timer.abort();
        }
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "Cleared pending undo operations");
        }
    }

    /// Whether `operation_id` is still pending.
    pub fn is_pending(&self, operation_id: &str) -> bool {
        self.operations.lock().contains_key(operation_id)
    }

    /// A pending operation's snapshot and expiry.
    pub fn get(&self, operation_id: &str) -> Option<PendingUndo> {
        self.operations.lock().get(operation_id).map(|op| PendingUndo {
            id: operation_id.to_string(),
            snapshot: op.snapshot.clone(),
            expires_at: op.expires_at,
        })
    }

    /// All pending operations, soonest expiry first.
    pub fn pending(&self) -> Vec<PendingUndo> {
        let mut pending: Vec<_> = self
            .operations
            .lock()
            .iter()
            .map(|(id, op)| PendingUndo {
                id: id.clone(),
                snapshot: op.snapshot.clone(),
                expires_at: op.expires_at,
            })
            .collect();
        pending.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then_with(|| a.id.cmp(&b.id)));
        pending
    }

    /// Number of pending operations.
    pub fn len(&self) -> usize {
        self.operations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn expire<F, Fut>(
    operations: Arc<Mutex<HashMap<OperationId, UndoOperation>>>,
    operation_id: OperationId,
    generation: u64,
    window: Duration,
    on_expire: F,
) where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    tokio::time::sleep(window).await;

    let claimed = {
        let mut operations = operations.lock();
        let live = operations
            .get(&operation_id)
            .is_some_and(|op| op.generation == generation);
        if live {
            operations.remove(&operation_id);
        }
        live
    };
    if claimed {
        tracing::debug!(operation_id = %operation_id, "Undo window expired, committing");
        on_expire().await;
    }
}
