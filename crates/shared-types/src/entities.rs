//! # Core Entities
//!
//! Identifiers and descriptive records exchanged between peers.

use crate::errors::IdentifierError;
use crate::time::TimeSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Protocol constants
// =============================================================================

/// Thirty seconds, in seconds.
pub const THIRTY_SECONDS: u64 = 30;

/// Five minutes, in seconds.
pub const FIVE_MINUTES: u64 = 5 * 60;

/// One day, in seconds.
pub const ONE_DAY: u64 = 24 * 60 * 60;

/// Thirty days, in seconds.
pub const THIRTY_DAYS: u64 = 30 * ONE_DAY;

/// Length of a topic in hex characters (SHA-256 digest).
pub const TOPIC_HEX_LEN: usize = 64;

// =============================================================================
// Topic
// =============================================================================

/// Relay-routable identifier derived from a symmetric key.
///
/// Always 64 lowercase hex characters. Construction from raw digest bytes
/// lives in `shared-crypto`; this type only guarantees the textual shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Topic(String);

impl Topic {
    /// Build a topic from a 32-byte digest.
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Validate and wrap a hex topic string.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let valid = value.len() == TOPIC_HEX_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(IdentifierError::InvalidTopic(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Topic {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Topic {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> Self {
        topic.0
    }
}

// =============================================================================
// Request identifiers
// =============================================================================

/// JSON-RPC message id. Unique per requester-generated sequence.
pub type RpcId = u64;

/// Generate a fresh JSON-RPC id: `now_ms * 1000 + random(0..1000)`.
///
/// Two ids generated in the same millisecond collide with probability 1/1000;
/// the history store rejects such a collision with `DuplicateId`.
pub fn payload_id() -> RpcId {
    use rand::Rng;

    let millis = crate::time::SystemTimeSource.now_millis();
    let extra: u64 = rand::thread_rng().gen_range(0..1000);
    millis * 1000 + extra
}

// =============================================================================
// Peer metadata
// =============================================================================

/// Self-description a client shares with its peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub icons: Vec<String>,
}

impl Metadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url: url.into(),
            icons: Vec::new(),
        }
    }
}

/// Requester block carried by an auth request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub public_key: Option<String>,
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "7f6e504bfad60b485450578e05678ed3e8e8c4751d3c6160be17160d63ec90f9";

    #[test]
    fn test_topic_parse_accepts_lowercase_hex() {
        let topic = Topic::parse(TOPIC).unwrap();
        assert_eq!(topic.as_str(), TOPIC);
        assert_eq!(topic.short(), "7f6e504b");
    }

    #[test]
    fn test_topic_parse_rejects_bad_shape() {
        assert!(Topic::parse("abc").is_err());
        assert!(Topic::parse(&TOPIC.to_uppercase()).is_err());
        assert!(Topic::parse(&format!("{}zz", &TOPIC[..62])).is_err());
    }

    #[test]
    fn test_topic_serde_validates() {
        let json = serde_json::to_string(&Topic::parse(TOPIC).unwrap()).unwrap();
        assert_eq!(json, format!("\"{TOPIC}\""));
        assert!(serde_json::from_str::<Topic>("\"nope\"").is_err());
    }

    #[test]
    fn test_payload_id_is_time_prefixed() {
        let before = crate::time::SystemTimeSource.now_millis() * 1000;
        let id = payload_id();
        let after = (crate::time::SystemTimeSource.now_millis() + 1) * 1000;
        assert!(id >= before && id < after);
    }
}
