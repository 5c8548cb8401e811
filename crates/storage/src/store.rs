//! MVCC in-memory statement store
//!
//! Committed state is an immutable [`Dataset`] published behind an `Arc`
//! together with a version number. Readers clone the `Arc` and never block
//! writers; a commit clones the latest version, applies its writes and swaps
//! the pointer.
//!
//! # Design Notes
//!
//! - **Copy-on-commit**: each commit copies the dataset, which is cheap for the
//!   transaction sizes the validator works with and keeps snapshots O(1)
//! - **Single committer**: commits serialize on `commit_lock`
//! - **Versioned**: the version increments once per commit that writes

use crate::connection::StoreConnection;
use crate::dataset::Dataset;
use crate::source::StatementSource;
use parking_lot::{Mutex, RwLock};
use shaclstore_core::{Pattern, Result, Statement};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Immutable view of one committed version
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    version: u64,
    data: Arc<Dataset>,
}

impl StoreSnapshot {
    pub(crate) fn new(version: u64, data: Arc<Dataset>) -> Self {
        Self { version, data }
    }

    /// Version this snapshot was taken at
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Underlying dataset
    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.data
    }

    /// Exact membership test
    pub fn contains(&self, statement: &Statement) -> bool {
        self.data.contains(statement)
    }
}

impl StatementSource for StoreSnapshot {
    fn statements(&self, pattern: &Pattern, _include_inferred: bool) -> Result<Vec<Statement>> {
        Ok(self.data.matching(pattern).cloned().collect())
    }

    fn has_statement(&self, pattern: &Pattern, _include_inferred: bool) -> Result<bool> {
        Ok(self.data.matching(pattern).next().is_some())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.data.len())
    }
}

pub(crate) struct StoreInner {
    pub(crate) name: String,
    pub(crate) committed: RwLock<StoreSnapshot>,
    pub(crate) commit_lock: Mutex<()>,
    pub(crate) next_txn_id: AtomicU64,
}

impl StoreInner {
    pub(crate) fn latest(&self) -> StoreSnapshot {
        self.committed.read().clone()
    }

    pub(crate) fn allocate_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Transactional in-memory statement store.
///
/// Cloning is cheap and yields another handle to the same store.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Create an empty store; `name` only appears in logs
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                name: name.into(),
                committed: RwLock::new(StoreSnapshot::new(0, Arc::new(Dataset::new()))),
                commit_lock: Mutex::new(()),
                next_txn_id: AtomicU64::new(1),
            }),
        }
    }

    /// Create a store already holding the given statements (version 1)
    pub fn with_statements(name: impl Into<String>, statements: impl IntoIterator<Item = Statement>) -> Self {
        let store = Self::new(name);
        let dataset: Dataset = statements.into_iter().collect();
        *store.inner.committed.write() = StoreSnapshot::new(1, Arc::new(dataset));
        store
    }

    /// Store name used in logs
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Open a connection with no active transaction
    pub fn connection(&self) -> StoreConnection {
        StoreConnection::new(Arc::clone(&self.inner))
    }

    /// Latest committed version
    pub fn snapshot(&self) -> StoreSnapshot {
        self.inner.latest()
    }

    /// Latest committed version number
    pub fn current_version(&self) -> u64 {
        self.inner.committed.read().version
    }

    /// Number of committed statements
    pub fn len(&self) -> usize {
        self.inner.committed.read().data.len()
    }

    /// True if nothing is committed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.inner.name)
            .field("version", &self.current_version())
            .field("len", &self.len())
            .finish()
    }
}
