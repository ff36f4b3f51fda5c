//! # Pairing Entities

use serde::{Deserialize, Serialize};
use shared_crypto::SymKey;
use shared_types::{Metadata, RpcId, Topic};

/// Where a pairing is in its lifecycle. Expired and disconnected pairings
/// are removed rather than kept in a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingState {
    /// URI minted, no exchange yet.
    Proposed,
    /// Joined from a peer's URI, no exchange yet.
    Paired,
    /// At least one authenticated exchange completed.
    Active,
}

/// Relay routing parameters carried in the URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayProtocol {
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl RelayProtocol {
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            data: None,
        }
    }
}

/// An encrypted channel to one peer.
///
/// The symmetric key never leaves this crate except inside the persisted
/// record and the URI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pairing {
    pub topic: Topic,
    pub(crate) sym_key: SymKey,
    pub relay: RelayProtocol,
    /// Unix seconds.
    pub expiry: u64,
    pub active: bool,
    pub state: PairingState,
    #[serde(default)]
    pub peer_metadata: Option<Metadata>,
    /// Present only until the pairing is first used.
    #[serde(default)]
    pub uri: Option<String>,
}

impl Pairing {
    pub fn is_expired(&self, now_secs: u64) -> bool {
        self.expiry <= now_secs
    }
}

/// Pairing notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    Created { topic: Topic, state: PairingState },
    Activated { topic: Topic },
    /// A ping was sent, or one arrived from the peer.
    Ping { topic: Topic, id: RpcId },
    /// The peer deleted the pairing.
    Delete { topic: Topic, code: i64, message: String },
    Expire { topic: Topic },
}

impl PairingEvent {
    pub fn topic(&self) -> &Topic {
        match self {
            Self::Created { topic, .. }
            | Self::Activated { topic }
            | Self::Ping { topic, .. }
            | Self::Delete { topic, .. }
            | Self::Expire { topic } => topic,
        }
    }
}
