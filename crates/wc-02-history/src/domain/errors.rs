//! # History Errors
//!
//! All variants except `Storage` are integrity violations: they indicate a
//! protocol or programming error and are always surfaced to the caller.

use shared_types::{KVStoreError, RpcId, Topic};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("Duplicate JSON-RPC id {id} on topic {topic}")]
    DuplicateId { id: RpcId, topic: Topic },

    #[error("No open request {id} on topic {topic}")]
    RecordNotFound { id: RpcId, topic: Topic },

    #[error("Request {id} already resolved with a different response")]
    AlreadyResolved { id: RpcId },

    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),
}
