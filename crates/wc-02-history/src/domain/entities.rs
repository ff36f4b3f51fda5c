//! # History Entities

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared_types::{ErrorPayload, JsonRpcRequest, ResponseOutcome, RpcId, Topic};

/// One request and, once it arrives, its response.
///
/// Created when a request is sent (or received), mutated exactly once when
/// its response is recorded, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonRpcRecord {
    pub id: RpcId,
    pub topic: Topic,
    pub request: JsonRpcRequest,
    pub response: Option<ResponseOutcome>,
    pub chain_id: Option<String>,
    /// Unix milliseconds.
    pub created_at: u64,
    pub resolved_at: Option<u64>,
}

impl JsonRpcRecord {
    pub fn method(&self) -> &str {
        &self.request.method
    }

    pub fn is_resolved(&self) -> bool {
        self.response.is_some()
    }
}

/// A request payload type tied to one JSON-RPC method.
///
/// Implemented by the params type of each method so history queries can be
/// expressed as types rather than method strings.
pub trait RequestShape: DeserializeOwned {
    const METHOD: &'static str;
}

/// A resolved record with request params and response decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRecord<Req, Res> {
    pub id: RpcId,
    pub topic: Topic,
    pub request: Req,
    pub response: Result<Res, ErrorPayload>,
    pub created_at: u64,
}
