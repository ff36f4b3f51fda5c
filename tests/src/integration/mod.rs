//! Cross-client flows.

pub mod auth_flows;
pub mod pairing_flows;
