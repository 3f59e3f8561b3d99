//! Per-user ordering and exclusion.
//!
//! Messages from different users are processed concurrently, but one user's
//! messages are handled strictly in arrival order: each user id owns a FIFO
//! queue drained by a single worker task ([`UserQueues`]).
//!
//! [`UserLocks`] guards a user's history for the length of one exchange (record
//! the prompt, call the backend, record the answer), so an owner's reset of
//! another user never lands in the middle of it.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created per-user FIFO queues.
#[derive(Debug)]
pub struct UserQueues<T> {
    queues: DashMap<String, UnboundedSender<T>>,
}

impl<T> Default for UserQueues<T> {
    fn default() -> Self {
        Self {
            queues: DashMap::new(),
        }
    }
}

impl<T> UserQueues<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `item` behind `user_id`'s earlier items.
    ///
    /// Returns the receiving end when the user has no live worker; the caller
    /// must start one that drains it and calls [`UserQueues::retire`] when idle.
    pub fn enqueue(&self, user_id: &str, item: T) -> Option<UnboundedReceiver<T>> {
        match self.queues.entry(user_id.to_string()) {
            Entry::Occupied(mut entry) => match entry.get().send(item) {
                Ok(()) => None,
                // worker gone without retiring; start over with a fresh queue
                Err(mpsc::error::SendError(item)) => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let _ = tx.send(item);
                    entry.insert(tx);
                    Some(rx)
                }
            },
            Entry::Vacant(entry) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let _ = tx.send(item);
                entry.insert(tx);
                Some(rx)
            }
        }
    }

    /// Drop `user_id`'s queue if `rx` has nothing pending. Returns `true` when
    /// the worker owning `rx` may stop.
    ///
    /// Runs under the map entry lock, so nothing can be enqueued between the
    /// emptiness check and the removal.
    pub fn retire(&self, user_id: &str, rx: &UnboundedReceiver<T>) -> bool {
        match self.queues.entry(user_id.to_string()) {
            Entry::Occupied(entry) => {
                if rx.is_empty() {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => true,
        }
    }

    /// Number of users with a live queue.
    pub fn active_users(&self) -> usize {
        self.queues.len()
    }
}

/// Lazily created per-user locks.
#[derive(Debug, Default)]
pub struct UserLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`'s conversation.
    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        // clone the Arc so the map shard is released before awaiting
        let lock = self.locks.entry(user_id.to_string()).or_default().clone();
        lock.lock_owned().await
    }
}
