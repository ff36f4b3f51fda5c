//! # Expiry Entities

use serde::{Deserialize, Serialize};
use shared_types::{RpcId, Topic};
use std::fmt;
use std::str::FromStr;

use super::errors::ExpirerError;

/// What an expiry entry is attached to.
///
/// Rendered as `topic:{topic}` or `id:{id}`; that string is also the
/// storage key suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExpiryTarget {
    Topic(Topic),
    Id(RpcId),
}

impl fmt::Display for ExpiryTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topic(t) => write!(f, "topic:{t}"),
            Self::Id(id) => write!(f, "id:{id}"),
        }
    }
}

impl FromStr for ExpiryTarget {
    type Err = ExpirerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ExpirerError::InvalidTarget(s.to_string());
        match s.split_once(':') {
            Some(("topic", rest)) => Topic::parse(rest).map(Self::Topic).map_err(|_| invalid()),
            Some(("id", rest)) => rest.parse().map(Self::Id).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for ExpiryTarget {
    type Error = ExpirerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExpiryTarget> for String {
    fn from(target: ExpiryTarget) -> Self {
        target.to_string()
    }
}

impl From<Topic> for ExpiryTarget {
    fn from(topic: Topic) -> Self {
        Self::Topic(topic)
    }
}

impl From<RpcId> for ExpiryTarget {
    fn from(id: RpcId) -> Self {
        Self::Id(id)
    }
}

/// Persisted expiry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryEntry {
    pub target: ExpiryTarget,
    /// Unix seconds.
    pub expires_at: u64,
}

/// Notifications emitted by the expirer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpirerEvent {
    /// Entry registered or overwritten.
    Created { target: ExpiryTarget, expires_at: u64 },
    /// Entry removed before expiring.
    Deleted { target: ExpiryTarget },
    /// Entry reached its deadline. Emitted once per entry.
    Expired { target: ExpiryTarget, expires_at: u64 },
}

impl ExpirerEvent {
    pub fn target(&self) -> &ExpiryTarget {
        match self {
            Self::Created { target, .. } | Self::Deleted { target } | Self::Expired { target, .. } => {
                target
            }
        }
    }
}
