//! # JSON-RPC History Service
//!
//! Records live in memory (ordered by id) and are mirrored to the key-value
//! store under `history:{id}`. Every mutation writes the store first and
//! updates memory only on success, under the same lock, so an observer never
//! sees a half-applied change.

use crate::domain::entities::{JsonRpcRecord, RequestShape, TypedRecord};
use crate::domain::errors::HistoryError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use shared_types::{
    scan_json, write_json, JsonRpcRequest, KeyValueStore, ResponseOutcome, RpcId, TimeSource,
    Topic,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Storage key prefix for history records.
pub const STORAGE_PREFIX: &str = "history:";

fn storage_key(id: RpcId) -> String {
    format!("{STORAGE_PREFIX}{id}")
}

pub struct JsonRpcHistory {
    records: RwLock<BTreeMap<RpcId, JsonRpcRecord>>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn TimeSource>,
}

impl JsonRpcHistory {
    /// Create the history, restoring records persisted in `store`.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, HistoryError> {
        let restored: Vec<JsonRpcRecord> = scan_json(store.as_ref(), STORAGE_PREFIX)?;
        if !restored.is_empty() {
            info!(records = restored.len(), "[wc-02] restored history");
        }
        Ok(Self {
            records: RwLock::new(restored.into_iter().map(|r| (r.id, r)).collect()),
            store,
            clock,
        })
    }

    /// Open a record for an outbound or inbound request.
    ///
    /// # Errors
    ///
    /// `DuplicateId` if a record with this id already exists.
    pub fn record_request(
        &self,
        topic: &Topic,
        request: &JsonRpcRequest,
        chain_id: Option<String>,
    ) -> Result<(), HistoryError> {
        let mut records = self.records.write();
        if records.contains_key(&request.id) {
            return Err(HistoryError::DuplicateId {
                id: request.id,
                topic: topic.clone(),
            });
        }

        let record = JsonRpcRecord {
            id: request.id,
            topic: topic.clone(),
            request: request.clone(),
            response: None,
            chain_id,
            created_at: self.clock.now_millis(),
            resolved_at: None,
        };
        write_json(self.store.as_ref(), &storage_key(record.id), &record)?;
        records.insert(record.id, record);

        debug!(id = request.id, topic = %topic.short(), method = %request.method, "[wc-02] request recorded");
        Ok(())
    }

    /// Resolve the record for `id` on `topic`.
    ///
    /// Repeating the same outcome is a no-op; a different outcome for an
    /// already resolved record fails.
    ///
    /// # Errors
    ///
    /// - `RecordNotFound` - no record with this id on this topic
    /// - `AlreadyResolved` - resolved earlier with a different outcome
    pub fn record_response(
        &self,
        topic: &Topic,
        id: RpcId,
        outcome: ResponseOutcome,
    ) -> Result<JsonRpcRecord, HistoryError> {
        let mut records = self.records.write();
        let Some(existing) = records.get(&id).filter(|r| &r.topic == topic) else {
            return Err(HistoryError::RecordNotFound {
                id,
                topic: topic.clone(),
            });
        };

        match &existing.response {
            Some(previous) if *previous == outcome => return Ok(existing.clone()),
            Some(_) => return Err(HistoryError::AlreadyResolved { id }),
            None => {}
        }

        let mut resolved = existing.clone();
        resolved.response = Some(outcome);
        resolved.resolved_at = Some(self.clock.now_millis());
        write_json(self.store.as_ref(), &storage_key(id), &resolved)?;
        records.insert(id, resolved.clone());

        debug!(id, topic = %topic.short(), "[wc-02] response recorded");
        Ok(resolved)
    }

    pub fn get(&self, id: RpcId) -> Option<JsonRpcRecord> {
        self.records.read().get(&id).cloned()
    }

    /// Whether a record with `id` exists on `topic`.
    pub fn exists(&self, topic: &Topic, id: RpcId) -> bool {
        self.records
            .read()
            .get(&id)
            .is_some_and(|r| &r.topic == topic)
    }

    /// Count of all records, resolved or not.
    pub fn size(&self) -> usize {
        self.records.read().len()
    }

    /// All records in creation order.
    pub fn records(&self) -> Vec<JsonRpcRecord> {
        let mut out: Vec<JsonRpcRecord> = self.records.read().values().cloned().collect();
        out.sort_by_key(|r| (r.created_at, r.id));
        out
    }

    /// Records still waiting for a response. Abandoned requests stay here
    /// indefinitely; nothing purges them.
    pub fn pending(&self) -> Vec<JsonRpcRecord> {
        self.records()
            .into_iter()
            .filter(|r| !r.is_resolved())
            .collect()
    }

    /// Resolved records whose method is `Req::METHOD`, decoded into typed
    /// request params and response, in creation order.
    ///
    /// Records whose payloads do not decode into the requested shapes are
    /// skipped.
    pub fn query_by_type<Req, Res>(&self) -> Vec<TypedRecord<Req, Res>>
    where
        Req: RequestShape,
        Res: DeserializeOwned,
    {
        self.records()
            .into_iter()
            .filter(|r| r.method() == Req::METHOD)
            .filter_map(|r| {
                let outcome = r.response.clone()?;
                let request: Req = match serde_json::from_value(r.request.params.clone()) {
                    Ok(req) => req,
                    Err(e) => {
                        warn!(id = r.id, error = %e, "[wc-02] request params do not match shape");
                        return None;
                    }
                };
                let response = match outcome {
                    ResponseOutcome::Result(value) => match serde_json::from_value(value) {
                        Ok(res) => Ok(res),
                        Err(e) => {
                            warn!(id = r.id, error = %e, "[wc-02] response does not match shape");
                            return None;
                        }
                    },
                    ResponseOutcome::Error(err) => Err(err),
                };
                Some(TypedRecord {
                    id: r.id,
                    topic: r.topic,
                    request,
                    response,
                    created_at: r.created_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use shared_types::{ErrorPayload, FileBackedKVStore, InMemoryKVStore, ManualTimeSource};

    const TOPIC_A: &str = "7f6e504bfad60b485450578e05678ed3e8e8c4751d3c6160be17160d63ec90f9";
    const TOPIC_B: &str = "1111111111111111111111111111111111111111111111111111111111111111";

    #[derive(Debug, PartialEq, Deserialize)]
    struct Greet {
        name: String,
    }

    impl RequestShape for Greet {
        const METHOD: &'static str = "test_greet";
    }

    fn topic(s: &str) -> Topic {
        Topic::parse(s).unwrap()
    }

    fn history() -> JsonRpcHistory {
        JsonRpcHistory::new(
            Arc::new(InMemoryKVStore::new()),
            Arc::new(ManualTimeSource::at_secs(1_000)),
        )
        .unwrap()
    }

    fn greet(id: RpcId, name: &str) -> JsonRpcRequest {
        JsonRpcRequest::with_id(id, "test_greet", json!({ "name": name }))
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let h = history();
        h.record_request(&topic(TOPIC_A), &greet(1, "a"), None).unwrap();
        assert!(matches!(
            h.record_request(&topic(TOPIC_A), &greet(1, "b"), None),
            Err(HistoryError::DuplicateId { id: 1, .. })
        ));
        assert_eq!(h.size(), 1);
    }

    #[test]
    fn test_response_requires_matching_topic() {
        let h = history();
        h.record_request(&topic(TOPIC_A), &greet(1, "a"), None).unwrap();

        let ok = ResponseOutcome::Result(json!("hi"));
        assert!(matches!(
            h.record_response(&topic(TOPIC_B), 1, ok.clone()),
            Err(HistoryError::RecordNotFound { .. })
        ));
        assert!(matches!(
            h.record_response(&topic(TOPIC_A), 2, ok),
            Err(HistoryError::RecordNotFound { .. })
        ));
    }

    #[test]
    fn test_resolution_is_idempotent_but_not_overwritable() {
        let h = history();
        h.record_request(&topic(TOPIC_A), &greet(1, "a"), None).unwrap();

        let ok = ResponseOutcome::Result(json!("hi"));
        let first = h.record_response(&topic(TOPIC_A), 1, ok.clone()).unwrap();
        let second = h.record_response(&topic(TOPIC_A), 1, ok).unwrap();
        assert_eq!(first, second);

        let conflicting = ResponseOutcome::Error(ErrorPayload::new(5000, "rejected"));
        assert_eq!(
            h.record_response(&topic(TOPIC_A), 1, conflicting),
            Err(HistoryError::AlreadyResolved { id: 1 })
        );
        assert_eq!(h.get(1).unwrap().response, Some(ResponseOutcome::Result(json!("hi"))));
    }

    #[test]
    fn test_size_counts_open_and_resolved() {
        let h = history();
        h.record_request(&topic(TOPIC_A), &greet(1, "a"), None).unwrap();
        h.record_request(&topic(TOPIC_A), &greet(2, "b"), None).unwrap();
        h.record_response(&topic(TOPIC_A), 1, ResponseOutcome::Result(json!("x")))
            .unwrap();

        assert_eq!(h.size(), 2);
        assert_eq!(h.pending().len(), 1);
        assert!(h.exists(&topic(TOPIC_A), 2));
        assert!(!h.exists(&topic(TOPIC_B), 2));
    }

    #[test]
    fn test_query_by_type_returns_resolved_matches_in_order() {
        let h = history();
        h.record_request(&topic(TOPIC_A), &greet(1, "a"), None).unwrap();
        h.record_request(&topic(TOPIC_A), &greet(2, "b"), None).unwrap();
        h.record_request(&topic(TOPIC_A), &greet(3, "c"), None).unwrap();
        h.record_request(
            &topic(TOPIC_A),
            &JsonRpcRequest::with_id(4, "other", json!({})),
            None,
        )
        .unwrap();

        h.record_response(&topic(TOPIC_A), 1, ResponseOutcome::Result(json!("hi a")))
            .unwrap();
        h.record_response(
            &topic(TOPIC_A),
            3,
            ResponseOutcome::Error(ErrorPayload::new(1, "no")),
        )
        .unwrap();
        h.record_response(&topic(TOPIC_A), 4, ResponseOutcome::Result(json!("x")))
            .unwrap();

        let typed = h.query_by_type::<Greet, String>();
        assert_eq!(typed.len(), 2);
        assert_eq!(typed[0].request, Greet { name: "a".into() });
        assert_eq!(typed[0].response, Ok("hi a".to_string()));
        assert_eq!(typed[1].id, 3);
        assert_eq!(typed[1].response, Err(ErrorPayload::new(1, "no")));
    }

    #[test]
    fn test_records_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let clock = Arc::new(ManualTimeSource::at_secs(1_000));
        {
            let store = Arc::new(FileBackedKVStore::open(&path).unwrap());
            let h = JsonRpcHistory::new(store, clock.clone()).unwrap();
            h.record_request(&topic(TOPIC_A), &greet(1, "a"), Some("eip155:1".into()))
                .unwrap();
            h.record_response(&topic(TOPIC_A), 1, ResponseOutcome::Result(json!("ok")))
                .unwrap();
            h.record_request(&topic(TOPIC_A), &greet(2, "b"), None).unwrap();
        }

        let store = Arc::new(FileBackedKVStore::open(&path).unwrap());
        let h = JsonRpcHistory::new(store, clock).unwrap();
        assert_eq!(h.size(), 2);
        assert_eq!(h.get(1).unwrap().chain_id.as_deref(), Some("eip155:1"));
        assert!(matches!(
            h.record_request(&topic(TOPIC_A), &greet(2, "again"), None),
            Err(HistoryError::DuplicateId { .. })
        ));
        assert!(h
            .record_response(&topic(TOPIC_A), 1, ResponseOutcome::Error(ErrorPayload::new(1, "x")))
            .is_err());
    }
}
