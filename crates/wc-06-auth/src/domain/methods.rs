use shared_types::ONE_DAY;
use wc_03_relayer::PublishOptions;
use wc_04_pairing::RpcMethod;

/// `wc_authRequest`. The request TTL is replaced by the request's expiry
/// when one is given.
pub const AUTH_REQUEST: RpcMethod = RpcMethod {
    name: "wc_authRequest",
    request: PublishOptions::new(ONE_DAY, 3000).with_prompt(true),
    response: PublishOptions::new(ONE_DAY, 3001),
};
