//! # Client Configuration
//!
//! One section per component, each with protocol defaults. Environment
//! overrides use the `WC_` prefix:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `WC_RELAY_URL` | `relayer.relay_url` |
//! | `WC_PROJECT_ID` | `relayer.project_id` |
//! | `WC_DISCONNECTED_POLICY` | `relayer.disconnected_policy` (`queue` / `fail`) |
//! | `WC_MAX_RECONNECT_ATTEMPTS` | `relayer.max_reconnect_attempts` |
//! | `WC_SWEEP_INTERVAL_MS` | `expirer.sweep_interval` |
//! | `WC_PAIRING_TTL` | `pairing.proposal_ttl` (seconds) |
//! | `WC_REQUEST_TTL` | `auth.default_request_ttl` (seconds) |
//! | `WC_APP_NAME` / `WC_APP_DESCRIPTION` / `WC_APP_URL` | `auth.metadata` |
//! | `WC_VERIFY_URL` | `verify.verify_url` |
//! | `WC_DATA_DIR` | `storage.data_dir` |
//!
//! Logging variables are read by [`TelemetryConfig::from_env`].

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use wc_03_relayer::RelayerConfig;
use wc_04_pairing::PairingConfig;
use wc_05_verify::VerifyConfig;
use wc_06_auth::AuthConfig;
use wc_telemetry::TelemetryConfig;

/// Complete client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub relayer: RelayerConfig,
    pub expirer: ExpirerConfig,
    pub pairing: PairingConfig,
    pub auth: AuthConfig,
    pub verify: VerifyConfig,
    pub storage: StorageConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpirerConfig {
    /// How often due entries are swept.
    pub sweep_interval: Duration,
}

impl Default for ExpirerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// `None` keeps all state in memory.
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub const FILE_NAME: &'static str = "wc-auth.json";

    /// Snapshot file inside `data_dir`, if persistence is on.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(Self::FILE_NAME))
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },

    #[error("relay url must use ws:// or wss://, got '{0}'")]
    RelayUrl(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("reconnect base delay {base:?} exceeds max delay {max:?}")]
    ReconnectDelays { base: Duration, max: Duration },
}

fn parse_var<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var,
        reason: e.to_string(),
    })
}

impl ClientConfig {
    /// Defaults overridden by `WC_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|var| std::env::var(var).ok())?;
        config.telemetry = TelemetryConfig::from_env();
        Ok(config)
    }

    /// Defaults overridden by whatever `lookup` returns for each `WC_*`
    /// variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("WC_RELAY_URL") {
            config.relayer.relay_url = url;
        }
        if let Some(project_id) = lookup("WC_PROJECT_ID") {
            config.relayer.project_id = project_id;
        }
        if let Some(raw) = lookup("WC_DISCONNECTED_POLICY") {
            config.relayer.disconnected_policy = parse_var("WC_DISCONNECTED_POLICY", &raw)?;
        }
        if let Some(raw) = lookup("WC_MAX_RECONNECT_ATTEMPTS") {
            config.relayer.max_reconnect_attempts = Some(parse_var("WC_MAX_RECONNECT_ATTEMPTS", &raw)?);
        }
        if let Some(raw) = lookup("WC_SWEEP_INTERVAL_MS") {
            config.expirer.sweep_interval =
                Duration::from_millis(parse_var("WC_SWEEP_INTERVAL_MS", &raw)?);
        }
        if let Some(raw) = lookup("WC_PAIRING_TTL") {
            config.pairing.proposal_ttl = parse_var("WC_PAIRING_TTL", &raw)?;
        }
        if let Some(raw) = lookup("WC_REQUEST_TTL") {
            config.auth.default_request_ttl = parse_var("WC_REQUEST_TTL", &raw)?;
        }
        if let Some(name) = lookup("WC_APP_NAME") {
            config.auth.metadata.name = name;
        }
        if let Some(description) = lookup("WC_APP_DESCRIPTION") {
            config.auth.metadata.description = description;
        }
        if let Some(url) = lookup("WC_APP_URL") {
            config.auth.metadata.url = url;
        }
        if let Some(url) = lookup("WC_VERIFY_URL") {
            config.verify.verify_url = url;
        }
        if let Some(dir) = lookup("WC_DATA_DIR").filter(|d| !d.is_empty()) {
            config.storage.data_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Reject settings no component can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.relayer.relay_url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::RelayUrl(url.clone()));
        }
        if self.relayer.reconnect_base_delay > self.relayer.reconnect_max_delay {
            return Err(ConfigError::ReconnectDelays {
                base: self.relayer.reconnect_base_delay,
                max: self.relayer.reconnect_max_delay,
            });
        }
        if self.expirer.sweep_interval.is_zero() {
            return Err(ConfigError::Zero("expirer.sweep_interval"));
        }
        if self.pairing.proposal_ttl == 0 {
            return Err(ConfigError::Zero("pairing.proposal_ttl"));
        }
        if self.pairing.active_ttl == 0 {
            return Err(ConfigError::Zero("pairing.active_ttl"));
        }
        if self.auth.default_request_ttl == 0 {
            return Err(ConfigError::Zero("auth.default_request_ttl"));
        }
        Ok(())
    }
}
