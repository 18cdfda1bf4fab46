//! Per-fingerprint in-flight coalescer: concurrent callers with an identical
//! key share the first caller's execution. On completion the result is
//! broadcast to every waiter and the slot is removed — this is a
//! coalescing mechanism, not a cache; the durable cache is the `KvStore`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Notify;

/// Slot shared by a leader and every caller that arrived while it was
/// in-flight. Waiters hold their own clone of the `Arc`, so the leader can
/// remove the map entry the instant it finishes without racing a waiter's
/// read of the result.
struct Shared<T, E> {
    notify: Notify,
    result: std::sync::Mutex<Option<Result<T, E>>>,
}

pub struct SingleFlight<T, E> {
    inflight: DashMap<String, Arc<Shared<T, E>>>,
}

impl<T, E> Default for SingleFlight<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, E: Clone> SingleFlight<T, E> {
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Runs `compute` for `key` with at-most-one in-flight execution across
    /// concurrent callers. The first caller for a key becomes the leader and
    /// runs `compute`; later callers wait and receive the leader's result
    /// without calling `compute` themselves.
    pub async fn run<F, Fut>(&self, key: &str, compute: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let (shared, is_leader) = match self.inflight.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => (occupied.get().clone(), false),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let shared = Arc::new(Shared {
                    notify: Notify::new(),
                    result: std::sync::Mutex::new(None),
                });
                vacant.insert(shared.clone());
                (shared, true)
            }
        };

        if !is_leader {
            shared.notify.notified().await;
            return shared
                .result
                .lock()
                .unwrap()
                .clone()
                .expect("leader always populates the result before notifying");
        }

        let result = compute().await;
        *shared.result.lock().unwrap() = Some(result.clone());
        // Remove before waking waiters: they already hold their own `Arc`
        // clone, so a fresh caller arriving after this point correctly
        // starts a new execution instead of reusing a stale result.
        self.inflight.remove(key);
        shared.notify.notify_waiters();
        result
    }
}
