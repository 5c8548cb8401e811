//! Diff materialization
//!
//! Turns a transaction's frozen diff into two queryable ephemeral stores. In
//! bulk mode nothing is built: the added view is the base store itself and the
//! removed view is empty.

use crate::reasoner::RdfsSubClassReasoner;
use rustc_hash::FxHashSet;
use shaclstore_concurrency::{FinalizedDiff, ValidationExecutor};
use shaclstore_core::{Result, Statement};
use shaclstore_storage::{MemoryStore, StoreSnapshot};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// One side of a materialized diff
#[derive(Debug, Clone)]
pub struct DiffStore {
    explicit: StoreSnapshot,
    expanded: StoreSnapshot,
}

impl DiffStore {
    fn build(
        name: &str,
        source: &FxHashSet<Statement>,
        opposite: &FxHashSet<Statement>,
        reasoner: Option<&RdfsSubClassReasoner>,
    ) -> Self {
        let explicit: Vec<Statement> = source
            .iter()
            .filter(|st| !opposite.contains(st))
            .cloned()
            .collect();
        let expanded = match reasoner {
            Some(reasoner) => explicit
                .iter()
                .flat_map(|st| reasoner.forward_chain(st))
                .collect::<Vec<_>>(),
            None => explicit.clone(),
        };
        Self {
            explicit: MemoryStore::with_statements(name, explicit).snapshot(),
            expanded: MemoryStore::with_statements(name, expanded).snapshot(),
        }
    }

    /// Statements as the transaction wrote them; used for replay
    pub fn explicit(&self) -> &StoreSnapshot {
        &self.explicit
    }

    /// RDFS-expanded statements; used by plans
    pub fn expanded(&self) -> &StoreSnapshot {
        &self.expanded
    }

    /// Number of expanded statements
    pub fn len(&self) -> usize {
        self.expanded.dataset().len()
    }

    /// True if nothing was materialized
    pub fn is_empty(&self) -> bool {
        self.expanded.dataset().is_empty()
    }
}

/// Added and removed views for one validation pass
#[derive(Debug, Clone)]
pub enum MaterializedDiff {
    /// Everything in the base store counts as added
    Bulk,
    /// Ephemeral added/removed stores
    Incremental {
        /// Net additions
        added: DiffStore,
        /// Net removals
        removed: DiffStore,
    },
}

impl MaterializedDiff {
    /// True in bulk mode
    pub fn is_bulk(&self) -> bool {
        matches!(self, MaterializedDiff::Bulk)
    }

    /// (added, removed) expanded sizes; zero in bulk mode
    pub fn sizes(&self) -> (usize, usize) {
        match self {
            MaterializedDiff::Bulk => (0, 0),
            MaterializedDiff::Incremental { added, removed } => (added.len(), removed.len()),
        }
    }
}

/// Builds [`MaterializedDiff`]s
pub struct DiffMaterializer<'a> {
    reasoner: Option<Arc<RdfsSubClassReasoner>>,
    executor: Option<&'a ValidationExecutor>,
}

impl<'a> DiffMaterializer<'a> {
    /// Materializer expanding through `reasoner` if given, building both sides
    /// on `executor` if given
    pub fn new(reasoner: Option<Arc<RdfsSubClassReasoner>>, executor: Option<&'a ValidationExecutor>) -> Self {
        Self { reasoner, executor }
    }

    /// Build the added and removed stores
    pub fn materialize(&self, diff: &FinalizedDiff) -> Result<MaterializedDiff> {
        let start = Instant::now();
        let reasoner = self.reasoner.as_deref();
        let build_added = || DiffStore::build("added", diff.added(), diff.removed(), reasoner);
        let build_removed = || DiffStore::build("removed", diff.removed(), diff.added(), reasoner);

        let (added, removed) = match self.executor {
            Some(executor) if !diff.added().is_empty() && !diff.removed().is_empty() => {
                executor.join(build_added, build_removed)?
            }
            _ => (build_added(), build_removed()),
        };
        debug!(
            target: "shaclstore::validation",
            added = added.len(),
            removed = removed.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Materialized transaction diff"
        );
        Ok(MaterializedDiff::Incremental { added, removed })
    }
}
