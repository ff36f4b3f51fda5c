//! # Outbound Ports
//!
//! The relayer drives a transport it does not own. One `connect` yields one
//! live session plus the stream of messages delivered on it; the stream
//! ending means the connection is gone.

use crate::domain::entities::{PublishOptions, RelayMessage};
use crate::domain::errors::RelayerError;
use async_trait::async_trait;
use shared_types::Topic;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opens connections to a relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn connect(&self) -> Result<TransportConnection, RelayerError>;
}

/// One live connection.
pub struct TransportConnection {
    /// Messages delivered for this connection's subscriptions. Closed when
    /// the connection drops.
    pub inbound: mpsc::UnboundedReceiver<RelayMessage>,
    pub session: Arc<dyn RelaySession>,
}

/// Operations on a live connection. Subscriptions do not outlive it.
#[async_trait]
pub trait RelaySession: Send + Sync {
    async fn publish(
        &self,
        topic: &Topic,
        message: &str,
        opts: PublishOptions,
    ) -> Result<(), RelayerError>;

    /// Returns the relay-assigned subscription id.
    async fn subscribe(&self, topic: &Topic) -> Result<String, RelayerError>;

    async fn unsubscribe(&self, topic: &Topic, id: &str) -> Result<(), RelayerError>;
}
