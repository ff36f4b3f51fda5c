//! # Inbound Ports

use crate::domain::entities::{PublishOptions, RelayerEvent, SubscriptionHandle};
use crate::domain::errors::RelayerError;
use async_trait::async_trait;
use shared_bus::Subscription;
use shared_types::Topic;
use std::time::Duration;

/// Topic-scoped publish/subscribe against the relay.
#[async_trait]
pub trait RelayerApi: Send + Sync {
    /// Fire-and-forget publish. While disconnected, queues or fails with
    /// `NotConnected` depending on policy.
    async fn publish(
        &self,
        topic: &Topic,
        message: &str,
        opts: PublishOptions,
    ) -> Result<(), RelayerError>;

    /// Subscribe to `topic`. Idempotent: a second call returns the existing
    /// handle.
    async fn subscribe(&self, topic: &Topic) -> Result<SubscriptionHandle, RelayerError>;

    async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), RelayerError>;

    /// Drop the subscription for `topic`, if any.
    async fn unsubscribe_topic(&self, topic: &Topic) -> Result<(), RelayerError>;

    fn is_subscribed(&self, topic: &Topic) -> bool;

    fn is_connected(&self) -> bool;

    /// Wait until a connection is up, or fail with `Timeout`.
    async fn wait_connected(&self, timeout: Duration) -> Result<(), RelayerError>;

    fn subscribe_events(&self) -> Subscription<RelayerEvent>;
}
