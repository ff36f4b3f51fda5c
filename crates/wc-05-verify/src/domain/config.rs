use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_VERIFY_URL: &str = "https://verify.walletconnect.com";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyConfig {
    pub verify_url: String,
    /// Upper bound on one lookup. The protocol never waits longer.
    pub resolve_timeout: Duration,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            verify_url: DEFAULT_VERIFY_URL.to_string(),
            resolve_timeout: Duration::from_secs(2),
        }
    }
}
