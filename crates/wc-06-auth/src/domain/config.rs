//! Auth engine configuration.

use serde::{Deserialize, Serialize};
use shared_types::{Metadata, ONE_DAY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of an auth request when the caller gives no expiry (seconds).
    pub default_request_ttl: u64,
    /// Metadata sent to the peer with every request.
    pub metadata: Metadata,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_request_ttl: ONE_DAY,
            metadata: Metadata::default(),
        }
    }
}
