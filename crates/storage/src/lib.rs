//! Storage layer for shaclstore
//!
//! This crate implements the transactional statement store the validator
//! runs on top of:
//! - Dataset: subject- and predicate-indexed statement set
//! - MemoryStore: MVCC store publishing immutable `Arc<Dataset>` versions
//! - StoreSnapshot: point-in-time read view of a committed version
//! - StoreConnection: transactional connection at a chosen isolation level
//! - StatementSource: the read interface every view implements
//! - StatementListener: synchronous add/remove notification hook

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connection;
pub mod dataset;
pub mod listener;
pub mod source;
pub mod store;

pub use connection::StoreConnection;
pub use dataset::Dataset;
pub use listener::StatementListener;
pub use source::StatementSource;
pub use store::{MemoryStore, StoreSnapshot};
