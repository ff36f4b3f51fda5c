//! Relayer configuration.

use super::entities::DisconnectedPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_RELAY_URL: &str = "wss://relay.walletconnect.com";
pub const DEFAULT_RELAY_PROTOCOL: &str = "irn";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayerConfig {
    pub relay_url: String,
    pub project_id: String,
    /// Protocol name advertised in pairing URIs (`relay-protocol`).
    pub protocol: String,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// `None` keeps retrying forever.
    pub max_reconnect_attempts: Option<u32>,
    pub disconnected_policy: DisconnectedPolicy,
    /// Bound on a single publish / subscribe round-trip.
    pub publish_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            project_id: String::new(),
            protocol: DEFAULT_RELAY_PROTOCOL.to_string(),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            max_reconnect_attempts: None,
            disconnected_policy: DisconnectedPolicy::Queue,
            publish_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}
