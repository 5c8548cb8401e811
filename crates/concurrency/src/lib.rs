//! Concurrency layer for shaclstore
//!
//! This crate holds the shared-state machinery the validating store is built on:
//! - LockManager: read-preferring read/write lock with owner tracking and
//!   fail-fast same-thread deadlock detection
//! - StatementDiff: per-transaction add/remove accumulator with self-cancellation
//! - Published: atomically swapped immutable value with a generation number
//! - ValidationExecutor: store-wide worker pool for parallel validation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod diff;
pub mod executor;
pub mod lock;
pub mod published;

pub use diff::{FinalizedDiff, StatementDiff};
pub use executor::{ExecutorStats, ValidationExecutor};
pub use lock::{LockManager, OwnerId, ReadLock, WriteLock};
pub use published::{Published, PublishedValue};
