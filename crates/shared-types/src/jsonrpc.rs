//! # JSON-RPC Wire Types
//!
//! JSON-RPC 2.0 envelopes exchanged (encrypted) over pairing topics.

use crate::entities::{payload_id, RpcId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound or inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub id: RpcId,
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    /// Build a request with a freshly generated id.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self::with_id(payload_id(), method, params)
    }

    pub fn with_id(id: RpcId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResult {
    pub id: RpcId,
    pub jsonrpc: String,
    pub result: Value,
}

impl JsonRpcResult {
    pub fn new(id: RpcId, result: Value) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            result,
        }
    }
}

/// Error object carried by an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: i64,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub id: RpcId,
    pub jsonrpc: String,
    pub error: ErrorPayload,
}

impl JsonRpcError {
    pub fn new(id: RpcId, error: ErrorPayload) -> Self {
        Self {
            id,
            jsonrpc: JSONRPC_VERSION.to_string(),
            error,
        }
    }
}

/// The outcome half of a response, independent of its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseOutcome {
    Result(Value),
    Error(ErrorPayload),
}

/// Any decrypted message on a pairing topic.
///
/// Untagged: a request is recognised by `method`, an error response by
/// `error`, anything else with `result` is a success response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcPayload {
    Request(JsonRpcRequest),
    Error(JsonRpcError),
    Result(JsonRpcResult),
}

impl JsonRpcPayload {
    pub fn id(&self) -> RpcId {
        match self {
            Self::Request(r) => r.id,
            Self::Error(e) => e.id,
            Self::Result(r) => r.id,
        }
    }

    /// Split a response into id and outcome. `None` for requests.
    pub fn into_response(self) -> Option<(RpcId, ResponseOutcome)> {
        match self {
            Self::Request(_) => None,
            Self::Error(e) => Some((e.id, ResponseOutcome::Error(e.error))),
            Self::Result(r) => Some((r.id, ResponseOutcome::Result(r.result))),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl From<JsonRpcRequest> for JsonRpcPayload {
    fn from(r: JsonRpcRequest) -> Self {
        Self::Request(r)
    }
}

impl From<JsonRpcResult> for JsonRpcPayload {
    fn from(r: JsonRpcResult) -> Self {
        Self::Result(r)
    }
}

impl From<JsonRpcError> for JsonRpcPayload {
    fn from(e: JsonRpcError) -> Self {
        Self::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_untagged_payload_discriminates_variants() {
        let req = JsonRpcPayload::from_json(
            r#"{"id":1,"jsonrpc":"2.0","method":"wc_pairingPing","params":{}}"#,
        )
        .unwrap();
        assert!(matches!(req, JsonRpcPayload::Request(ref r) if r.method == "wc_pairingPing"));

        let ok = JsonRpcPayload::from_json(r#"{"id":2,"jsonrpc":"2.0","result":true}"#).unwrap();
        assert_eq!(
            ok.into_response(),
            Some((2, ResponseOutcome::Result(json!(true))))
        );

        let err = JsonRpcPayload::from_json(
            r#"{"id":3,"jsonrpc":"2.0","error":{"code":-1,"message":"nope"}}"#,
        )
        .unwrap();
        assert_eq!(
            err.into_response(),
            Some((3, ResponseOutcome::Error(ErrorPayload::new(-1, "nope"))))
        );
    }

    #[test]
    fn test_request_carries_version_and_fresh_id() {
        let a = JsonRpcRequest::new("m", json!({}));
        assert_eq!(a.jsonrpc, "2.0");
        let encoded = JsonRpcPayload::from(a.clone()).to_json().unwrap();
        assert_eq!(JsonRpcPayload::from_json(&encoded).unwrap().id(), a.id);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(JsonRpcPayload::from_json(r#"{"id":4}"#).is_err());
        assert!(JsonRpcPayload::from_json("not json").is_err());
    }
}
