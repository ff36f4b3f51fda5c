//! # JSON-RPC History Subsystem (WC-02)
//!
//! Durable log of request/response pairs keyed by message id and topic.
//!
//! ## Record lifecycle
//!
//! ```text
//! record_request ──▶ open ──record_response──▶ resolved (immutable)
//! ```
//!
//! Open records whose request expired are abandoned but kept for audit;
//! nothing in this crate deletes a record.

pub mod domain;
pub mod service;

pub use domain::entities::{JsonRpcRecord, RequestShape, TypedRecord};
pub use domain::errors::HistoryError;
pub use service::JsonRpcHistory;
