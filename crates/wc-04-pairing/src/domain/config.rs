//! Pairing configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Lifetime of a freshly minted or joined pairing, in seconds.
    pub proposal_ttl: u64,
    /// Lifetime after activation, in seconds.
    pub active_ttl: u64,
    pub ping_timeout: Duration,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            proposal_ttl: shared_types::FIVE_MINUTES,
            active_ttl: shared_types::THIRTY_DAYS,
            ping_timeout: Duration::from_secs(shared_types::THIRTY_SECONDS),
        }
    }
}
