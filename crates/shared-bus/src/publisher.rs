//! # Event Publisher
//!
//! The registry side of the bus: handler tokens mapped to per-subscriber
//! queues.

use crate::subscriber::{Subscription, SubscriptionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub(crate) type Registry<E> = Arc<RwLock<HashMap<SubscriptionId, mpsc::UnboundedSender<E>>>>;

/// Trait for publishing events.
///
/// Components depend on this rather than on [`EventBus`] so tests can
/// substitute a recorder.
pub trait EventPublisher<E>: Send + Sync {
    /// Deliver `event` to every current subscriber.
    ///
    /// Returns the number of subscribers that received it.
    fn publish(&self, event: E) -> usize;
}

/// In-process typed event registry.
pub struct EventBus<E> {
    handlers: Registry<E>,
    next_id: AtomicU64,
    events_published: AtomicU64,
}

impl<E: Clone + Send + 'static> EventBus<E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            events_published: AtomicU64::new(0),
        }
    }

    /// Register a handler and return its subscription.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<E> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.handlers.write().insert(id, tx);
        debug!(subscription = id.0, "[bus] handler registered");
        Subscription::new(id, rx, Arc::downgrade(&self.handlers))
    }

    /// Remove a handler by token. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.handlers.write().remove(&id).is_some();
        if removed {
            debug!(subscription = id.0, "[bus] handler removed");
        }
        removed
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Total events published over the lifetime of the bus.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + Sync + 'static> EventPublisher<E> for EventBus<E> {
    fn publish(&self, event: E) -> usize {
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let handlers = self.handlers.read();
            for (id, tx) in handlers.iter() {
                if tx.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    closed.push(*id);
                }
            }
        }

        if !closed.is_empty() {
            let mut handlers = self.handlers.write();
            for id in closed {
                handlers.remove(&id);
            }
        }
        delivered
    }
}
