//! # Shared Types Crate
//!
//! Types every subsystem of the auth client agrees on.
//!
//! ## Contents
//!
//! - **Identifiers**: [`Topic`] and [`RpcId`], the two keys all protocol
//!   state is indexed by.
//! - **Wire types**: JSON-RPC 2.0 request / result / error envelopes.
//! - **Ports**: [`KeyValueStore`] for persisted state and [`TimeSource`] for
//!   the wall clock.
//! - **Cancellation**: [`CancelSignal`] accepted by every suspending operation.

pub mod cancel;
pub mod entities;
pub mod errors;
pub mod jsonrpc;
pub mod storage;
pub mod time;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use entities::*;
pub use errors::*;
pub use jsonrpc::*;
pub use storage::{
    read_json, scan_json, write_json, BatchOperation, FileBackedKVStore, InMemoryKVStore,
    KeyValueStore,
};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
