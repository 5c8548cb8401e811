//! Statement change notification

use shaclstore_core::{Result, Statement};

/// Receives every visible change made by a transaction, synchronously and in
/// call order.
///
/// Adding a statement that is already visible, or removing one that is not,
/// produces no event. An error returned from a callback aborts the mutation
/// that triggered it.
pub trait StatementListener: Send + Sync {
    /// A statement became visible to the transaction
    fn statement_added(&self, statement: &Statement) -> Result<()>;

    /// A statement stopped being visible to the transaction
    fn statement_removed(&self, statement: &Statement) -> Result<()>;
}
