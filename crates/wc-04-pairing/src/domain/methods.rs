//! JSON-RPC methods carried over a pairing topic, with their publish
//! options.

use wc_03_relayer::PublishOptions;

/// A method name plus the relay options for its request and response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcMethod {
    pub name: &'static str,
    pub request: PublishOptions,
    pub response: PublishOptions,
}

pub const PAIRING_PING: RpcMethod = RpcMethod {
    name: "wc_pairingPing",
    request: PublishOptions::new(shared_types::THIRTY_SECONDS, 1002),
    response: PublishOptions::new(shared_types::THIRTY_SECONDS, 1003),
};

pub const PAIRING_DELETE: RpcMethod = RpcMethod {
    name: "wc_pairingDelete",
    request: PublishOptions::new(shared_types::ONE_DAY, 1000),
    response: PublishOptions::new(shared_types::ONE_DAY, 1001),
};

/// Reason sent with `wc_pairingDelete` on a user-initiated disconnect.
pub const USER_DISCONNECTED_CODE: i64 = 6000;
pub const USER_DISCONNECTED_MESSAGE: &str = "User disconnected.";

/// Whether `method` is handled by the pairing manager itself.
pub fn is_pairing_method(method: &str) -> bool {
    method == PAIRING_PING.name || method == PAIRING_DELETE.name
}

/// Params of `wc_pairingDelete`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeleteParams {
    pub code: i64,
    pub message: String,
}

impl DeleteParams {
    pub fn user_disconnected() -> Self {
        Self {
            code: USER_DISCONNECTED_CODE,
            message: USER_DISCONNECTED_MESSAGE.to_string(),
        }
    }
}
