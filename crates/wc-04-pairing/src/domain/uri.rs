//! # Pairing URI
//!
//! ```text
//! wc:{topic}@{version}?symKey={hex}&relay-protocol={name}[&relay-data={data}][&expiryTimestamp={unix}]
//! ```
//!
//! Parsing accepts parameters in any order and ignores unknown ones.
//! Building always emits the order above, so `parse(build(u)) == u` and
//! `build(parse(s)) == s` for every `s` this module produced.

use super::entities::RelayProtocol;
use super::errors::PairingError;
use shared_crypto::{derive_topic, SymKey};
use shared_types::Topic;
use std::fmt;
use std::str::FromStr;
use url::form_urlencoded::byte_serialize;
use url::Url;

pub const URI_SCHEME: &str = "wc";
pub const URI_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingUri {
    pub topic: Topic,
    pub version: u32,
    pub sym_key: SymKey,
    pub relay: RelayProtocol,
    /// Unix seconds agreed by both peers.
    pub expiry_timestamp: Option<u64>,
}

fn invalid(reason: impl Into<String>) -> PairingError {
    PairingError::InvalidUri(reason.into())
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

impl PairingUri {
    pub fn new(sym_key: SymKey, relay: RelayProtocol, expiry_timestamp: u64) -> Self {
        Self {
            topic: derive_topic(&sym_key),
            version: URI_VERSION,
            sym_key,
            relay,
            expiry_timestamp: Some(expiry_timestamp),
        }
    }

    /// Parse and validate a pairing URI. Expiry against the clock is the
    /// caller's check.
    pub fn parse(raw: &str) -> Result<Self, PairingError> {
        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() != URI_SCHEME {
            return Err(invalid(format!("unexpected scheme '{}'", url.scheme())));
        }

        let (topic, version) = url
            .path()
            .split_once('@')
            .ok_or_else(|| invalid("missing version"))?;
        if topic.is_empty() {
            return Err(invalid("missing topic"));
        }
        let topic = Topic::parse(topic).map_err(|e| invalid(e.to_string()))?;
        let version: u32 = version
            .parse()
            .map_err(|_| invalid(format!("bad version '{version}'")))?;
        if version != URI_VERSION {
            return Err(invalid(format!("unsupported version {version}")));
        }

        let mut sym_key = None;
        let mut protocol = None;
        let mut data = None;
        let mut expiry = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "symKey" => sym_key = Some(value.into_owned()),
                "relay-protocol" => protocol = Some(value.into_owned()),
                "relay-data" => data = Some(value.into_owned()),
                "expiryTimestamp" => {
                    let ts = value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("bad expiryTimestamp '{value}'")))?;
                    expiry = Some(ts);
                }
                _ => {}
            }
        }

        let sym_key = sym_key.ok_or_else(|| invalid("missing symKey"))?;
        let sym_key = SymKey::from_hex(&sym_key).map_err(|e| invalid(e.to_string()))?;
        let protocol = protocol
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid("missing relay-protocol"))?;

        if derive_topic(&sym_key) != topic {
            return Err(invalid("topic does not match symKey"));
        }

        Ok(Self {
            topic,
            version,
            sym_key,
            relay: RelayProtocol { protocol, data },
            expiry_timestamp: expiry,
        })
    }
}

impl fmt::Display for PairingUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{URI_SCHEME}:{}@{}?symKey={}&relay-protocol={}",
            self.topic,
            self.version,
            self.sym_key.to_hex(),
            encode(&self.relay.protocol)
        )?;
        if let Some(data) = &self.relay.data {
            write!(f, "&relay-data={}", encode(data))?;
        }
        if let Some(ts) = self.expiry_timestamp {
            write!(f, "&expiryTimestamp={ts}")?;
        }
        Ok(())
    }
}

impl FromStr for PairingUri {
    type Err = PairingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
