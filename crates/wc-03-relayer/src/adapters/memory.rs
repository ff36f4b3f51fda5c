//! # In-Memory Relay
//!
//! A process-local relay hub for tests and embedded use. Mirrors the parts
//! of the real relay contract the client depends on:
//!
//! - Store-and-forward: a message is kept until its TTL passes and handed
//!   to every subscriber of its topic, including ones that subscribe later.
//! - A peer never receives its own publishes.
//! - Subscriptions die with the connection.
//!
//! Each peer gets its own [`InMemoryTransport`] via [`InMemoryRelay::transport`].

use crate::domain::entities::{PublishOptions, RelayMessage};
use crate::domain::errors::RelayerError;
use crate::ports::outbound::{RelaySession, RelayTransport, TransportConnection};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{SystemTimeSource, TimeSource, Topic};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

type PeerId = u64;

struct StoredMessage {
    topic: Topic,
    message: String,
    publisher: PeerId,
    published_at: u64,
    /// Unix seconds.
    expires_at: u64,
    delivered: HashSet<PeerId>,
}

struct Connection {
    generation: u64,
    tx: mpsc::UnboundedSender<RelayMessage>,
    subscriptions: HashMap<Topic, String>,
}

struct HubState {
    online: bool,
    next_peer: PeerId,
    next_generation: u64,
    next_subscription: u64,
    connections: HashMap<PeerId, Connection>,
    mailbox: Vec<StoredMessage>,
    published: u64,
}

impl HubState {
    fn connection(&mut self, peer: PeerId, generation: u64) -> Result<&mut Connection, RelayerError> {
        match self.connections.get_mut(&peer) {
            Some(conn) if conn.generation == generation => Ok(conn),
            _ => Err(RelayerError::NotConnected),
        }
    }
}

/// Shared hub. Cloning yields another handle to the same relay.
#[derive(Clone)]
pub struct InMemoryRelay {
    state: Arc<Mutex<HubState>>,
    clock: Arc<dyn TimeSource>,
}

impl InMemoryRelay {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemTimeSource))
    }

    pub fn with_clock(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                online: true,
                next_peer: 1,
                next_generation: 1,
                next_subscription: 1,
                connections: HashMap::new(),
                mailbox: Vec::new(),
                published: 0,
            })),
            clock,
        }
    }

    /// A transport for one peer. Reconnects through it keep the peer's
    /// identity, so stored messages are not redelivered to it.
    pub fn transport(&self) -> InMemoryTransport {
        let peer = {
            let mut state = self.state.lock();
            let peer = state.next_peer;
            state.next_peer += 1;
            peer
        };
        InMemoryTransport {
            hub: self.clone(),
            peer,
        }
    }

    /// While offline, every connect attempt fails.
    pub fn set_online(&self, online: bool) {
        self.state.lock().online = online;
    }

    /// Close every live connection, as if the relay restarted.
    pub fn drop_connections(&self) {
        let dropped = {
            let mut state = self.state.lock();
            let n = state.connections.len();
            state.connections.clear();
            n
        };
        debug!(dropped, "[wc-03] in-memory relay dropped connections");
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Total publishes accepted since creation.
    pub fn published_count(&self) -> u64 {
        self.state.lock().published
    }

    /// Unexpired messages held for `topic`.
    pub fn stored_count(&self, topic: &Topic) -> usize {
        let now = self.clock.now_secs();
        self.state
            .lock()
            .mailbox
            .iter()
            .filter(|m| &m.topic == topic && m.expires_at > now)
            .count()
    }

    fn connect(&self, peer: PeerId) -> Result<TransportConnection, RelayerError> {
        let mut state = self.state.lock();
        if !state.online {
            return Err(RelayerError::Transport("relay unreachable".into()));
        }
        let generation = state.next_generation;
        state.next_generation += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        state.connections.insert(
            peer,
            Connection {
                generation,
                tx,
                subscriptions: HashMap::new(),
            },
        );
        debug!(peer, generation, "[wc-03] in-memory peer connected");

        Ok(TransportConnection {
            inbound: rx,
            session: Arc::new(InMemorySession {
                hub: self.clone(),
                peer,
                generation,
            }),
        })
    }

    fn publish(
        &self,
        peer: PeerId,
        generation: u64,
        topic: &Topic,
        message: &str,
        opts: PublishOptions,
    ) -> Result<(), RelayerError> {
        let now_ms = self.clock.now_millis();
        let now = now_ms / 1000;
        let mut state = self.state.lock();
        state.connection(peer, generation)?;
        state.mailbox.retain(|m| m.expires_at > now);

        let mut stored = StoredMessage {
            topic: topic.clone(),
            message: message.to_string(),
            publisher: peer,
            published_at: now_ms,
            expires_at: now.saturating_add(opts.ttl),
            delivered: HashSet::new(),
        };

        for (&other, conn) in &state.connections {
            if other == peer || !conn.subscriptions.contains_key(topic) {
                continue;
            }
            if deliver(conn, &stored) {
                stored.delivered.insert(other);
            }
        }

        state.mailbox.push(stored);
        state.published += 1;
        Ok(())
    }

    fn subscribe(&self, peer: PeerId, generation: u64, topic: &Topic) -> Result<String, RelayerError> {
        let now = self.clock.now_secs();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let existing = state
            .connection(peer, generation)?
            .subscriptions
            .get(topic)
            .cloned();
        let id = match existing {
            Some(id) => id,
            None => {
                let id = format!("sub-{}", state.next_subscription);
                state.next_subscription += 1;
                id
            }
        };
        let Some(conn) = state.connections.get_mut(&peer) else {
            return Err(RelayerError::NotConnected);
        };
        conn.subscriptions.insert(topic.clone(), id.clone());

        // Mailbox: hand over anything stored for this topic the peer has
        // not seen yet, oldest first.
        for stored in state.mailbox.iter_mut() {
            if &stored.topic != topic
                || stored.publisher == peer
                || stored.expires_at <= now
                || stored.delivered.contains(&peer)
            {
                continue;
            }
            if deliver(conn, stored) {
                stored.delivered.insert(peer);
            }
        }
        Ok(id)
    }

    fn unsubscribe(&self, peer: PeerId, generation: u64, topic: &Topic) -> Result<(), RelayerError> {
        let mut state = self.state.lock();
        state.connection(peer, generation)?.subscriptions.remove(topic);
        Ok(())
    }
}

impl Default for InMemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver(conn: &Connection, stored: &StoredMessage) -> bool {
    conn.tx
        .send(RelayMessage {
            topic: stored.topic.clone(),
            message: stored.message.clone(),
            published_at: stored.published_at,
        })
        .is_ok()
}

/// One peer's view of an [`InMemoryRelay`].
pub struct InMemoryTransport {
    hub: InMemoryRelay,
    peer: PeerId,
}

#[async_trait]
impl RelayTransport for InMemoryTransport {
    async fn connect(&self) -> Result<TransportConnection, RelayerError> {
        self.hub.connect(self.peer)
    }
}

struct InMemorySession {
    hub: InMemoryRelay,
    peer: PeerId,
    generation: u64,
}

#[async_trait]
impl RelaySession for InMemorySession {
    async fn publish(
        &self,
        topic: &Topic,
        message: &str,
        opts: PublishOptions,
    ) -> Result<(), RelayerError> {
        self.hub.publish(self.peer, self.generation, topic, message, opts)
    }

    async fn subscribe(&self, topic: &Topic) -> Result<String, RelayerError> {
        self.hub.subscribe(self.peer, self.generation, topic)
    }

    async fn unsubscribe(&self, topic: &Topic, _id: &str) -> Result<(), RelayerError> {
        self.hub.unsubscribe(self.peer, self.generation, topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ManualTimeSource;

    const TOPIC: &str = "7f6e504bfad60b485450578e05678ed3e8e8c4751d3c6160be17160d63ec90f9";

    fn topic() -> Topic {
        Topic::parse(TOPIC).unwrap()
    }

    #[tokio::test]
    async fn test_late_subscriber_receives_stored_message() {
        let hub = InMemoryRelay::new();
        let a = hub.transport().connect().await.unwrap();
        let mut b = hub.transport().connect().await.unwrap();

        a.session
            .publish(&topic(), "hello", PublishOptions::new(300, 1))
            .await
            .unwrap();
        b.session.subscribe(&topic()).await.unwrap();

        let msg = b.inbound.recv().await.unwrap();
        assert_eq!(msg.message, "hello");
        assert_eq!(hub.stored_count(&topic()), 1);
    }

    #[tokio::test]
    async fn test_publisher_does_not_receive_own_message() {
        let hub = InMemoryRelay::new();
        let mut a = hub.transport().connect().await.unwrap();
        a.session.subscribe(&topic()).await.unwrap();
        a.session
            .publish(&topic(), "mine", PublishOptions::new(300, 1))
            .await
            .unwrap();
        assert!(a.inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_expired_messages_not_forwarded() {
        let clock = Arc::new(ManualTimeSource::at_secs(1_000));
        let hub = InMemoryRelay::with_clock(clock.clone());
        let a = hub.transport().connect().await.unwrap();
        let mut b = hub.transport().connect().await.unwrap();

        a.session
            .publish(&topic(), "short", PublishOptions::new(30, 1))
            .await
            .unwrap();
        clock.advance_secs(31);
        b.session.subscribe(&topic()).await.unwrap();
        assert!(b.inbound.try_recv().is_err());
        assert_eq!(hub.stored_count(&topic()), 0);
    }

    #[tokio::test]
    async fn test_resubscribe_after_reconnect_skips_delivered() {
        let hub = InMemoryRelay::new();
        let a = hub.transport().connect().await.unwrap();
        let b_transport = hub.transport();
        let mut b = b_transport.connect().await.unwrap();

        b.session.subscribe(&topic()).await.unwrap();
        a.session
            .publish(&topic(), "once", PublishOptions::new(300, 1))
            .await
            .unwrap();
        assert_eq!(b.inbound.recv().await.unwrap().message, "once");

        hub.drop_connections();
        assert!(b.inbound.recv().await.is_none());
        assert!(matches!(
            b.session.subscribe(&topic()).await,
            Err(RelayerError::NotConnected)
        ));

        let mut b2 = b_transport.connect().await.unwrap();
        b2.session.subscribe(&topic()).await.unwrap();
        assert!(b2.inbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_offline_relay_refuses_connections() {
        let hub = InMemoryRelay::new();
        hub.set_online(false);
        assert!(matches!(
            hub.transport().connect().await,
            Err(RelayerError::Transport(_))
        ));
        hub.set_online(true);
        assert!(hub.transport().connect().await.is_ok());
        assert_eq!(hub.connection_count(), 1);
    }
}
