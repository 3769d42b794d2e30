//! Sequential execution lock.
//!
//! [`SequentialLock::run`] executes deferred work strictly in submission
//! order: a call's work does not begin until every previously submitted
//! piece of work on the same lock has finished, whether it succeeded,
//! failed, panicked or was dropped mid-way.
//!
//! The lock is an explicit FIFO of waiters plus a single "active" flag. The
//! finishing task hands the turn directly to the next waiter, so no later
//! arrival can overtake an earlier one.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct LockState {
    active: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// FIFO serializer for asynchronous work.
#[derive(Debug, Default)]
pub struct SequentialLock {
    state: Mutex<LockState>,
}

impl SequentialLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` once every earlier submission has completed.
    pub async fn run<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _turn = self.acquire().await;
        f().await
    }

    /// Whether some work currently holds the lock.
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Number of submissions waiting for their turn.
    pub fn queued(&self) -> usize {
        self.state.lock().waiters.len()
    }

    async fn acquire(&self) -> Turn<'_> {
        let rx = {
            let mut state = self.state.lock();
            if !state.active {
                state.active = true;
                return Turn { lock: self };
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        let mut waiter = Waiter {
            lock: self,
            rx: Some(rx),
        };
        if let Some(rx) = waiter.rx.as_mut() {
            // Queued senders are only consumed by `release`, so this resolves
            // exactly when the turn is ours.
            let _ = rx.await;
        }
        waiter.rx = None;
        Turn { lock: self }
    }

    /// Pass the turn to the next live waiter, or go idle.
    fn release(&self) {
        let mut state = self.state.lock();
        while let Some(next) = state.waiters.pop_front() {
            if next.send(()).is_ok() {
                return;
            }
        }
        state.active = false;
    }
}

/// Held while work runs; releases on drop.
struct Turn<'a> {
    lock: &'a SequentialLock,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// A queued acquisition. If dropped after the turn was handed to it but
/// before it noticed, it passes the turn on instead of losing it.
struct Waiter<'a> {
    lock: &'a SequentialLock,
    rx: Option<oneshot::Receiver<()>>,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.lock.release();
            }
        }
    }
}
