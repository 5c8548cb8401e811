//! Error types for shaclstore
//!
//! This module defines the error type shared by the storage, concurrency and
//! engine layers. Validation-specific failures live in the SHACL crate and
//! wrap this type.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the store and its transaction machinery
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation requires an active transaction
    #[error("No active transaction")]
    TransactionNotActive,

    /// `begin` called while a transaction is already running
    #[error("Transaction already active")]
    TransactionAlreadyActive,

    /// Illegal state transition or call order
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Commit lost a first-committer-wins race
    #[error("Commit conflict: {0}")]
    Conflict(String),

    /// Lock acquisition would block forever on the calling thread
    #[error("Deadlock detected: {0}")]
    Deadlock(String),

    /// A statement mutation reached the diff tracker after finalization
    #[error("Statement {operation} observed after the transaction diff was finalized: {statement}")]
    DiffFinalized {
        /// "add" or "remove"
        operation: &'static str,
        /// Rendered statement
        statement: String,
    },

    /// Connection was closed
    #[error("Connection is closed")]
    Closed,

    /// Store was shut down
    #[error("Store has been shut down")]
    Shutdown,

    /// Caller supplied an unusable value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// True for errors a caller may resolve by retrying the transaction
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Deadlock(_))
    }
}
