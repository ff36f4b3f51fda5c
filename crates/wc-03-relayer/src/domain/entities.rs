//! # Relayer Entities

use serde::{Deserialize, Serialize};
use shared_types::Topic;
use std::fmt;

/// Options attached to every publish. Reported verbatim in
/// [`RelayerEvent::Publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOptions {
    /// Seconds the relay keeps the message for late subscribers.
    pub ttl: u64,
    pub tag: u32,
    /// Ask the relay to wake the receiving wallet.
    pub prompt: bool,
}

impl PublishOptions {
    pub const fn new(ttl: u64, tag: u32) -> Self {
        Self {
            ttl,
            tag,
            prompt: false,
        }
    }

    #[must_use]
    pub const fn with_prompt(mut self, prompt: bool) -> Self {
        self.prompt = prompt;
        self
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A ciphertext seen on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayMessage {
    pub topic: Topic,
    /// Base64 envelope, opaque to the relayer.
    pub message: String,
    /// Unix milliseconds as reported by the relay, 0 if unknown.
    #[serde(default)]
    pub published_at: u64,
}

impl RelayMessage {
    pub fn new(topic: Topic, message: impl Into<String>) -> Self {
        Self {
            topic,
            message: message.into(),
            published_at: 0,
        }
    }
}

/// Local, stable handle for a topic subscription. Survives reconnects even
/// though the relay-assigned id does not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: String,
    pub topic: Topic,
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.topic.short())
    }
}

/// What `publish` / `subscribe` do while no relay connection is up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectedPolicy {
    /// Buffer publishes and remember subscriptions until reconnect.
    #[default]
    Queue,
    /// Fail immediately with `NotConnected`.
    Fail,
}

impl std::str::FromStr for DisconnectedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "queue" => Ok(Self::Queue),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown disconnected policy '{other}'")),
        }
    }
}

/// Relayer notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayerEvent {
    Connect,
    Disconnect { reason: String },
    /// Inbound ciphertext on a subscribed topic, after de-duplication.
    Message(RelayMessage),
    /// A publish was attempted with exactly these options.
    Publish {
        topic: Topic,
        message: String,
        opts: PublishOptions,
    },
    Subscribe { topic: Topic, id: String },
    Unsubscribe { topic: Topic, id: String },
}
