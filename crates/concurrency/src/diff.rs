//! Per-transaction statement diff
//!
//! [`StatementDiff`] is attached to the base transaction as a
//! [`StatementListener`] and records the transaction's net effect.
//!
//! # Invariants
//!
//! - Adding a statement present in the removed set cancels it out of that set
//!   instead of recording an addition, and symmetrically for removal, so
//!   `added ∩ removed = ∅` at all times.
//! - [`StatementDiff::finalize`] freezes the sets. It is idempotent, and any
//!   mutation observed afterwards is an ordering bug in the caller and fails
//!   with [`Error::DiffFinalized`].

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use shaclstore_core::{Error, Result, Statement};
use shaclstore_storage::StatementListener;
use std::sync::Arc;

/// Frozen (added, removed) sets of one transaction
#[derive(Debug, Clone, Default)]
pub struct FinalizedDiff {
    added: Arc<FxHashSet<Statement>>,
    removed: Arc<FxHashSet<Statement>>,
}

impl FinalizedDiff {
    /// Build directly from sets; statements present in both are dropped from both
    pub fn from_sets(mut added: FxHashSet<Statement>, mut removed: FxHashSet<Statement>) -> Self {
        let both: Vec<Statement> = added.intersection(&removed).cloned().collect();
        for statement in &both {
            added.remove(statement);
            removed.remove(statement);
        }
        Self {
            added: Arc::new(added),
            removed: Arc::new(removed),
        }
    }

    /// Statements the transaction added
    pub fn added(&self) -> &FxHashSet<Statement> {
        &self.added
    }

    /// Statements the transaction removed
    pub fn removed(&self) -> &FxHashSet<Statement> {
        &self.removed
    }

    /// True if the transaction has no net effect
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed statements
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }

    /// True if any added or removed statement has the given predicate
    pub fn touches_predicate(&self, iri: &str) -> bool {
        self.added
            .iter()
            .chain(self.removed.iter())
            .any(|st| st.has_predicate(iri))
    }
}

#[derive(Debug, Default)]
struct DiffState {
    added: FxHashSet<Statement>,
    removed: FxHashSet<Statement>,
    finalized: Option<FinalizedDiff>,
}

/// Listener accumulating a transaction's net statement changes
#[derive(Debug, Default)]
pub struct StatementDiff {
    state: Mutex<DiffState>,
}

impl StatementDiff {
    /// Create an empty diff
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze and return the sets; later calls return the same sets
    pub fn finalize(&self) -> FinalizedDiff {
        let mut state = self.state.lock();
        if let Some(done) = &state.finalized {
            return done.clone();
        }
        let done = FinalizedDiff {
            added: Arc::new(std::mem::take(&mut state.added)),
            removed: Arc::new(std::mem::take(&mut state.removed)),
        };
        state.finalized = Some(done.clone());
        done
    }

    /// True once `finalize` has run
    pub fn is_finalized(&self) -> bool {
        self.state.lock().finalized.is_some()
    }

    /// Drop everything, including a finalized snapshot
    pub fn reset(&self) {
        *self.state.lock() = DiffState::default();
    }

    /// Number of changed statements tracked so far
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        match &state.finalized {
            Some(done) => done.len(),
            None => state.added.len() + state.removed.len(),
        }
    }

    /// True if nothing has changed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StatementListener for StatementDiff {
    fn statement_added(&self, statement: &Statement) -> Result<()> {
        let mut state = self.state.lock();
        if state.finalized.is_some() {
            return Err(Error::DiffFinalized {
                operation: "add",
                statement: statement.to_string(),
            });
        }
        if !state.removed.remove(statement) {
            state.added.insert(statement.clone());
        }
        Ok(())
    }

    fn statement_removed(&self, statement: &Statement) -> Result<()> {
        let mut state = self.state.lock();
        if state.finalized.is_some() {
            return Err(Error::DiffFinalized {
                operation: "remove",
                statement: statement.to_string(),
            });
        }
        if !state.added.remove(statement) {
            state.removed.insert(statement.clone());
        }
        Ok(())
    }
}
