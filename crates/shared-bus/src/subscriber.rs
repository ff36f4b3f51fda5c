//! # Event Subscriber
//!
//! Defines the subscription side of the event bus.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Weak;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

type WeakRegistry<E> = Weak<RwLock<HashMap<SubscriptionId, mpsc::UnboundedSender<E>>>>;

/// Handler token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The handler was removed or the bus dropped.
    #[error("Subscription closed")]
    Closed,

    /// No matching event arrived in time.
    #[error("Timed out waiting for event")]
    Timeout,
}

/// A subscription handle for receiving events.
///
/// When dropped, the handler is removed from the bus.
pub struct Subscription<E> {
    id: SubscriptionId,
    receiver: mpsc::UnboundedReceiver<E>,
    registry: WeakRegistry<E>,
}

impl<E> Subscription<E> {
    pub(crate) fn new(
        id: SubscriptionId,
        receiver: mpsc::UnboundedReceiver<E>,
        registry: WeakRegistry<E>,
    ) -> Self {
        Self {
            id,
            receiver,
            registry,
        }
    }

    /// The handler token.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next event.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next event
    /// - `None` - The handler was removed or the bus dropped
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    /// Try to receive the next event without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was queued
    /// - `Ok(None)` - No event queued
    /// - `Err(SubscriptionError::Closed)` - The handler was removed
    pub fn try_recv(&mut self) -> Result<Option<E>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(e) => Ok(Some(e)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    /// Wait for the first event satisfying `predicate`, skipping others.
    pub async fn recv_matching<F>(
        &mut self,
        timeout: Duration,
        mut predicate: F,
    ) -> Result<E, SubscriptionError>
    where
        F: FnMut(&E) -> bool,
    {
        let wait = async {
            while let Some(event) = self.receiver.recv().await {
                if predicate(&event) {
                    return Ok(event);
                }
            }
            Err(SubscriptionError::Closed)
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SubscriptionError::Timeout)?
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        registry.write().remove(&self.id);
        debug!(subscription = self.id.0, "[bus] subscription dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventBus, EventPublisher};

    #[tokio::test]
    async fn test_recv_matching_skips_other_events() {
        let bus = EventBus::<u32>::new();
        let mut sub = bus.subscribe();
        bus.publish(1);
        bus.publish(2);
        bus.publish(42);

        let got = sub
            .recv_matching(Duration::from_millis(100), |n| *n > 10)
            .await
            .unwrap();
        assert_eq!(got, 42);
    }

    #[tokio::test]
    async fn test_recv_matching_times_out() {
        let bus = EventBus::<u32>::new();
        let mut sub = bus.subscribe();
        bus.publish(1);

        let res = sub.recv_matching(Duration::from_millis(20), |n| *n > 10).await;
        assert_eq!(res, Err(SubscriptionError::Timeout));
    }

    #[tokio::test]
    async fn test_recv_returns_none_after_bus_drop() {
        let bus = EventBus::<u32>::new();
        let mut sub = bus.subscribe();
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_try_recv_empty() {
        let bus = EventBus::<u32>::new();
        let mut sub = bus.subscribe();
        assert_eq!(sub.try_recv(), Ok(None));
        bus.publish(3);
        assert_eq!(sub.try_recv(), Ok(Some(3)));
    }
}
