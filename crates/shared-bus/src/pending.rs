//! # Pending Request Store
//!
//! Async request/response bridge. A caller registers an id, sends its
//! request, and awaits the returned receiver; whoever sees the response
//! calls `complete(id, value)`.
//!
//! Flow:
//! 1. Caller calls `register(id, method)` and gets a oneshot receiver
//! 2. Caller sends the request carrying `id`
//! 3. The inbound path receives the response and calls `complete()`
//! 4. Caller awaits the receiver, bounded by its own timeout / cancellation,
//!    and calls `cancel()` if it gives up

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A pending request waiting for response
struct PendingRequest<V> {
    sender: oneshot::Sender<V>,
    created_at: Instant,
    method: String,
}

/// Statistics for pending request store
#[derive(Debug, Default)]
pub struct PendingStats {
    pub total_registered: AtomicU64,
    pub total_completed: AtomicU64,
    /// Requests abandoned by their caller (cancelled or receiver dropped).
    pub total_cancelled: AtomicU64,
}

/// Maps request ids to waiting callers.
pub struct PendingRequestStore<V> {
    pending: DashMap<u64, PendingRequest<V>>,
    stats: PendingStats,
}

impl<V> PendingRequestStore<V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: PendingStats::default(),
        }
    }

    /// Register a pending request and get a receiver for the response.
    ///
    /// Registering an id twice replaces the earlier waiter, whose receiver
    /// then resolves with an error.
    pub fn register(&self, id: u64, method: &str) -> oneshot::Receiver<V> {
        let (tx, rx) = oneshot::channel();
        let request = PendingRequest {
            sender: tx,
            created_at: Instant::now(),
            method: method.to_string(),
        };
        self.pending.insert(id, request);
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(id, method, "[pending] registered");
        rx
    }

    /// Complete a pending request with a response.
    ///
    /// Returns true if a waiter received it.
    pub fn complete(&self, id: u64, value: V) -> bool {
        let Some((_, pending)) = self.pending.remove(&id) else {
            warn!(id, "[pending] response for unknown or abandoned request");
            return false;
        };

        let elapsed_ms = pending.created_at.elapsed().as_millis();
        if pending.sender.send(value).is_ok() {
            self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
            debug!(id, method = %pending.method, elapsed_ms, "[pending] completed");
            true
        } else {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(id, method = %pending.method, "[pending] receiver dropped");
            false
        }
    }

    /// Drop the waiter for `id`. Returns whether one was registered.
    pub fn cancel(&self, id: u64) -> bool {
        let removed = self.pending.remove(&id).is_some();
        if removed {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

impl<V> Default for PendingRequestStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_complete() {
        let store = PendingRequestStore::<String>::new();
        let rx = store.register(7, "wc_pairingPing");
        assert!(store.contains(7));

        assert!(store.complete(7, "pong".to_string()));
        assert_eq!(rx.await.unwrap(), "pong");
        assert_eq!(store.pending_count(), 0);
        assert_eq!(store.stats().total_completed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_complete_unknown_id() {
        let store = PendingRequestStore::<u8>::new();
        assert!(!store.complete(1, 0));
    }

    #[test]
    fn test_dropped_receiver_counts_as_cancelled() {
        let store = PendingRequestStore::<u8>::new();
        drop(store.register(1, "m"));
        assert!(!store.complete(1, 0));
        assert_eq!(store.stats().total_cancelled.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_cancel_closes_receiver() {
        let store = PendingRequestStore::<u8>::new();
        let rx = store.register(1, "m");
        assert!(store.cancel(1));
        assert!(!store.cancel(1));
        assert!(rx.await.is_err());
    }
}
