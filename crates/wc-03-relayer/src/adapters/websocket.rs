//! # WebSocket Relay Transport
//!
//! Speaks the relay's JSON-RPC dialect over one WebSocket per connection:
//!
//! | Direction | Method | Params |
//! |-----------|--------|--------|
//! | out | `irn_publish` | `{topic, message, ttl, tag, prompt}` |
//! | out | `irn_subscribe` | `{topic}` → subscription id |
//! | out | `irn_unsubscribe` | `{topic, id}` |
//! | in  | `irn_subscription` | `{id, data: {topic, message, publishedAt}}` |
//!
//! A reader task routes responses to waiting callers and subscription
//! notifications to the inbound channel; a writer task owns the sink.

use crate::domain::config::RelayerConfig;
use crate::domain::entities::{PublishOptions, RelayMessage};
use crate::domain::errors::RelayerError;
use crate::ports::outbound::{RelaySession, RelayTransport, TransportConnection};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use shared_bus::PendingRequestStore;
use shared_types::{JsonRpcPayload, JsonRpcRequest, JsonRpcResult, ResponseOutcome, RpcId, Topic};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

const METHOD_PUBLISH: &str = "irn_publish";
const METHOD_SUBSCRIBE: &str = "irn_subscribe";
const METHOD_UNSUBSCRIBE: &str = "irn_unsubscribe";
const METHOD_SUBSCRIPTION: &str = "irn_subscription";

#[derive(Debug, Deserialize)]
struct SubscriptionParams {
    #[allow(dead_code)]
    id: String,
    data: SubscriptionData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionData {
    topic: Topic,
    message: String,
    #[serde(default)]
    published_at: u64,
}

pub struct WebSocketTransport {
    endpoint: String,
}

impl WebSocketTransport {
    /// Build the endpoint from `relay_url` plus the `projectId` query.
    pub fn new(config: &RelayerConfig) -> Result<Self, RelayerError> {
        let mut url = url::Url::parse(&config.relay_url)
            .map_err(|e| RelayerError::Transport(format!("invalid relay url: {e}")))?;
        if !config.project_id.is_empty() {
            url.query_pairs_mut()
                .append_pair("projectId", &config.project_id);
        }
        Ok(Self {
            endpoint: url.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RelayTransport for WebSocketTransport {
    async fn connect(&self) -> Result<TransportConnection, RelayerError> {
        let (stream, _) = connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| RelayerError::Transport(e.to_string()))?;
        let (mut write, mut read) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(PendingRequestStore::<ResponseOutcome>::new());

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = write.send(frame).await {
                    warn!(error = %e, "[wc-03] websocket write failed");
                    break;
                }
            }
            let _ = write.close().await;
        });

        let reader_pending = Arc::clone(&pending);
        let reply = out_tx.clone();
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        handle_text(text.as_str(), &reader_pending, &in_tx, &reply);
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = reply.send(Message::Pong(data));
                    }
                    Ok(Message::Close(_)) => break,
                    Err(e) => {
                        warn!(error = %e, "[wc-03] websocket read failed");
                        break;
                    }
                    _ => {}
                }
            }
            debug!("[wc-03] websocket reader finished");
        });

        Ok(TransportConnection {
            inbound: in_rx,
            session: Arc::new(WebSocketSession {
                out: out_tx,
                pending,
            }),
        })
    }
}

fn handle_text(
    text: &str,
    pending: &PendingRequestStore<ResponseOutcome>,
    inbound: &mpsc::UnboundedSender<RelayMessage>,
    reply: &mpsc::UnboundedSender<Message>,
) {
    let payload = match JsonRpcPayload::from_json(text) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "[wc-03] unparseable relay frame");
            return;
        }
    };

    match payload {
        JsonRpcPayload::Request(req) if req.method == METHOD_SUBSCRIPTION => {
            match serde_json::from_value::<SubscriptionParams>(req.params) {
                Ok(params) => {
                    let _ = inbound.send(RelayMessage {
                        topic: params.data.topic,
                        message: params.data.message,
                        published_at: params.data.published_at,
                    });
                }
                Err(e) => warn!(id = req.id, error = %e, "[wc-03] bad subscription notification"),
            }
            let ack = JsonRpcPayload::from(JsonRpcResult::new(req.id, Value::Bool(true)));
            if let Ok(raw) = ack.to_json() {
                let _ = reply.send(Message::Text(raw.into()));
            }
        }
        JsonRpcPayload::Request(req) => {
            debug!(method = %req.method, "[wc-03] ignoring relay request");
        }
        response => {
            if let Some((id, outcome)) = response.into_response() {
                pending.complete(id, outcome);
            }
        }
    }
}

/// Drops the pending entry if the caller gives up (timeout, cancellation).
struct PendingGuard<'a> {
    store: &'a PendingRequestStore<ResponseOutcome>,
    id: RpcId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.store.cancel(self.id);
    }
}

struct WebSocketSession {
    out: mpsc::UnboundedSender<Message>,
    pending: Arc<PendingRequestStore<ResponseOutcome>>,
}

impl WebSocketSession {
    async fn request(&self, method: &str, params: Value) -> Result<Value, RelayerError> {
        let request = JsonRpcRequest::new(method, params);
        let id = request.id;
        let rx = self.pending.register(id, method);
        let _guard = PendingGuard {
            store: &self.pending,
            id,
        };

        let raw = JsonRpcPayload::from(request)
            .to_json()
            .map_err(|e| RelayerError::Transport(e.to_string()))?;
        self.out
            .send(Message::Text(raw.into()))
            .map_err(|_| RelayerError::NotConnected)?;

        match rx.await {
            Ok(ResponseOutcome::Result(value)) => Ok(value),
            Ok(ResponseOutcome::Error(err)) => Err(RelayerError::Rejected {
                code: err.code,
                message: err.message,
            }),
            Err(_) => Err(RelayerError::NotConnected),
        }
    }
}

#[async_trait]
impl RelaySession for WebSocketSession {
    async fn publish(
        &self,
        topic: &Topic,
        message: &str,
        opts: PublishOptions,
    ) -> Result<(), RelayerError> {
        let params = json!({
            "topic": topic,
            "message": message,
            "ttl": opts.ttl,
            "tag": opts.tag,
            "prompt": opts.prompt,
        });
        self.request(METHOD_PUBLISH, params).await.map(|_| ())
    }

    async fn subscribe(&self, topic: &Topic) -> Result<String, RelayerError> {
        let result = self
            .request(METHOD_SUBSCRIBE, json!({ "topic": topic }))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RelayerError::Transport("subscription id is not a string".into()))
    }

    async fn unsubscribe(&self, topic: &Topic, id: &str) -> Result<(), RelayerError> {
        self.request(METHOD_UNSUBSCRIBE, json!({ "topic": topic, "id": id }))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "7f6e504bfad60b485450578e05678ed3e8e8c4751d3c6160be17160d63ec90f9";

    #[test]
    fn test_endpoint_carries_project_id() {
        let config = RelayerConfig {
            relay_url: "wss://relay.example.com".into(),
            project_id: "abc123".into(),
            ..RelayerConfig::default()
        };
        let transport = WebSocketTransport::new(&config).unwrap();
        assert_eq!(transport.endpoint(), "wss://relay.example.com/?projectId=abc123");
    }

    #[test]
    fn test_subscription_notification_forwarded_and_acked() {
        let pending = PendingRequestStore::new();
        let (in_tx, mut in_rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();

        let frame = json!({
            "id": 42,
            "jsonrpc": "2.0",
            "method": "irn_subscription",
            "params": {
                "id": "sub-1",
                "data": { "topic": TOPIC, "message": "Y2lwaGVy", "publishedAt": 1700000000000u64 }
            }
        })
        .to_string();
        handle_text(&frame, &pending, &in_tx, &reply_tx);

        let msg = in_rx.try_recv().unwrap();
        assert_eq!(msg.topic.as_str(), TOPIC);
        assert_eq!(msg.message, "Y2lwaGVy");
        match reply_rx.try_recv().unwrap() {
            Message::Text(text) => assert!(text.as_str().contains("\"result\":true")),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_response_completes_pending_request() {
        let pending = PendingRequestStore::new();
        let rx = pending.register(7, METHOD_SUBSCRIBE);
        let (in_tx, _in_rx) = mpsc::unbounded_channel();
        let (reply_tx, _reply_rx) = mpsc::unbounded_channel();

        handle_text(r#"{"id":7,"jsonrpc":"2.0","result":"sub-9"}"#, &pending, &in_tx, &reply_tx);
        assert_eq!(rx.await.unwrap(), ResponseOutcome::Result(json!("sub-9")));
    }
}
