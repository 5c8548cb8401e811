//! Read interface shared by connections, snapshots and reasoning views

use shaclstore_core::{Pattern, Result, Statement};

/// Anything statements can be read from.
///
/// `include_inferred` asks for statements entailed by a reasoner. Plain stores
/// hold no inferred statements and ignore the flag; reasoning views honour it.
///
/// Results are returned in a deterministic order for a given state.
pub trait StatementSource: Send + Sync {
    /// Statements matching the pattern
    fn statements(&self, pattern: &Pattern, include_inferred: bool) -> Result<Vec<Statement>>;

    /// True if at least one statement matches
    fn has_statement(&self, pattern: &Pattern, include_inferred: bool) -> Result<bool> {
        Ok(!self.statements(pattern, include_inferred)?.is_empty())
    }

    /// Number of explicit statements visible
    fn len(&self) -> Result<usize>;

    /// True if no explicit statements are visible
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
