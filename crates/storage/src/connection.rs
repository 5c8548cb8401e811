//! Transactional store connection
//!
//! A connection runs at most one transaction at a time. The transaction keeps
//! an overlay of added and removed statements on top of a base version:
//!
//! - `SnapshotRead` and stronger read from the version current at `begin`
//! - `None` and `ReadCommitted` read from the latest committed version
//! - `begin_pinned` reads from a caller-supplied version regardless of level,
//!   which lets a second connection observe exactly the state another
//!   transaction started from
//!
//! ## Commit
//!
//! ```text
//! 1. take the store's commit lock
//! 2. Serializable only: abort if another writer committed since begin
//! 3. clone the latest version, apply removals then additions
//! 4. publish the new version
//! ```

use crate::dataset::Dataset;
use crate::listener::StatementListener;
use crate::source::StatementSource;
use crate::store::{StoreInner, StoreSnapshot};
use shaclstore_core::{Error, GraphFilter, IsolationLevel, Pattern, Result, Statement};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

struct StoreTxn {
    id: u64,
    isolation: IsolationLevel,
    start: StoreSnapshot,
    pinned: bool,
    added: BTreeSet<Statement>,
    removed: BTreeSet<Statement>,
    listeners: Vec<Arc<dyn StatementListener>>,
}

impl StoreTxn {
    fn has_writes(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Connection to a [`MemoryStore`](crate::MemoryStore)
pub struct StoreConnection {
    store: Arc<StoreInner>,
    txn: Option<StoreTxn>,
}

impl StoreConnection {
    pub(crate) fn new(store: Arc<StoreInner>) -> Self {
        Self { store, txn: None }
    }

    /// Begin a transaction at the given isolation level
    pub fn begin(&mut self, isolation: IsolationLevel) -> Result<()> {
        let start = self.store.latest();
        self.start_txn(isolation, start, isolation.reads_from_snapshot())
    }

    /// Begin a transaction whose reads are fixed to `pin`
    pub fn begin_pinned(&mut self, isolation: IsolationLevel, pin: StoreSnapshot) -> Result<()> {
        self.start_txn(isolation, pin, true)
    }

    fn start_txn(&mut self, isolation: IsolationLevel, start: StoreSnapshot, pinned: bool) -> Result<()> {
        if self.txn.is_some() {
            return Err(Error::TransactionAlreadyActive);
        }
        let id = self.store.allocate_txn_id();
        trace!(
            target: "shaclstore::store",
            store = %self.store.name,
            txn_id = id,
            version = start.version(),
            %isolation,
            "transaction started"
        );
        self.txn = Some(StoreTxn {
            id,
            isolation,
            start,
            pinned,
            added: BTreeSet::new(),
            removed: BTreeSet::new(),
            listeners: Vec::new(),
        });
        Ok(())
    }

    /// True while a transaction is open
    pub fn is_active(&self) -> bool {
        self.txn.is_some()
    }

    /// Isolation level of the open transaction
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.txn.as_ref().map(|t| t.isolation)
    }

    /// The committed version the open transaction started from
    pub fn start_snapshot(&self) -> Result<StoreSnapshot> {
        self.active().map(|t| t.start.clone())
    }

    /// Number of pending (added, removed) statements
    pub fn pending_changes(&self) -> (usize, usize) {
        self.txn
            .as_ref()
            .map_or((0, 0), |t| (t.added.len(), t.removed.len()))
    }

    /// Pending (added, removed) statements of the open transaction
    pub fn pending_statements(&self) -> (Vec<Statement>, Vec<Statement>) {
        self.txn.as_ref().map_or_else(Default::default, |t| {
            (
                t.added.iter().cloned().collect(),
                t.removed.iter().cloned().collect(),
            )
        })
    }

    /// Attach a listener to the open transaction.
    ///
    /// Listeners are dropped when the transaction commits or rolls back.
    pub fn add_listener(&mut self, listener: Arc<dyn StatementListener>) -> Result<()> {
        self.active_mut()?.listeners.push(listener);
        Ok(())
    }

    /// Detach a listener; returns false if it was not attached
    pub fn remove_listener(&mut self, listener: &Arc<dyn StatementListener>) -> bool {
        match self.txn.as_mut() {
            Some(txn) => {
                let before = txn.listeners.len();
                txn.listeners.retain(|l| !Arc::ptr_eq(l, listener));
                txn.listeners.len() != before
            }
            None => false,
        }
    }

    /// Add a statement. Returns false if it was already visible.
    pub fn add(&mut self, statement: Statement) -> Result<bool> {
        let base = self.base()?;
        let txn = self.active_mut()?;
        if visible(&base, txn, &statement) {
            return Ok(false);
        }
        for listener in &txn.listeners {
            listener.statement_added(&statement)?;
        }
        if !txn.removed.remove(&statement) {
            txn.added.insert(statement);
        }
        Ok(true)
    }

    /// Remove a statement. Returns false if it was not visible.
    pub fn remove(&mut self, statement: &Statement) -> Result<bool> {
        let base = self.base()?;
        let txn = self.active_mut()?;
        if !visible(&base, txn, statement) {
            return Ok(false);
        }
        for listener in &txn.listeners {
            listener.statement_removed(statement)?;
        }
        if !txn.added.remove(statement) {
            txn.removed.insert(statement.clone());
        }
        Ok(true)
    }

    /// Remove every visible statement matching the pattern
    pub fn remove_matching(&mut self, pattern: &Pattern) -> Result<usize> {
        let matches = self.statements(pattern, false)?;
        let mut count = 0;
        for statement in &matches {
            if self.remove(statement)? {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Remove every visible statement in the given graphs
    pub fn clear(&mut self, graph: GraphFilter) -> Result<usize> {
        self.remove_matching(&Pattern::any().graph(graph))
    }

    /// Commit the open transaction and return the resulting version
    pub fn commit(&mut self) -> Result<u64> {
        let txn = self.txn.take().ok_or(Error::TransactionNotActive)?;
        let _commit_guard = self.store.commit_lock.lock();
        let current = self.store.latest();

        if !txn.has_writes() {
            debug!(target: "shaclstore::store", store = %self.store.name, txn_id = txn.id, "read-only commit");
            return Ok(current.version());
        }

        self.check_conflict(&txn, &current)?;

        let mut data: Dataset = (**current.dataset()).clone();
        for statement in &txn.removed {
            data.remove(statement);
        }
        for statement in txn.added {
            data.insert(statement);
        }
        let version = current.version() + 1;
        *self.store.committed.write() = StoreSnapshot::new(version, Arc::new(data));
        debug!(
            target: "shaclstore::store",
            store = %self.store.name,
            txn_id = txn.id,
            version,
            removed = txn.removed.len(),
            "transaction committed"
        );
        Ok(version)
    }

    /// Fail with [`Error::Conflict`] if committing now would conflict.
    ///
    /// Runs the same check as [`commit`](Self::commit) without publishing
    /// anything. The answer only holds while no other writer can commit.
    pub fn check_commit(&self) -> Result<()> {
        let txn = self.active()?;
        if !txn.has_writes() {
            return Ok(());
        }
        self.check_conflict(txn, &self.store.latest())
    }

    fn check_conflict(&self, txn: &StoreTxn, current: &StoreSnapshot) -> Result<()> {
        if txn.isolation != IsolationLevel::Serializable || current.version() == txn.start.version() {
            return Ok(());
        }
        debug!(
            target: "shaclstore::store",
            store = %self.store.name,
            txn_id = txn.id,
            start_version = txn.start.version(),
            current_version = current.version(),
            "serializable commit conflict"
        );
        Err(Error::Conflict(format!(
            "store '{}' moved from version {} to {} during the transaction",
            self.store.name,
            txn.start.version(),
            current.version()
        )))
    }

    /// Discard the open transaction
    pub fn rollback(&mut self) -> Result<()> {
        let txn = self.txn.take().ok_or(Error::TransactionNotActive)?;
        trace!(target: "shaclstore::store", store = %self.store.name, txn_id = txn.id, "transaction rolled back");
        Ok(())
    }

    fn active(&self) -> Result<&StoreTxn> {
        self.txn.as_ref().ok_or(Error::TransactionNotActive)
    }

    fn active_mut(&mut self) -> Result<&mut StoreTxn> {
        self.txn.as_mut().ok_or(Error::TransactionNotActive)
    }

    fn base(&self) -> Result<StoreSnapshot> {
        let txn = self.active()?;
        Ok(if txn.pinned {
            txn.start.clone()
        } else {
            self.store.latest()
        })
    }
}

fn visible(base: &StoreSnapshot, txn: &StoreTxn, statement: &Statement) -> bool {
    txn.added.contains(statement) || (base.contains(statement) && !txn.removed.contains(statement))
}

impl StatementSource for StoreConnection {
    fn statements(&self, pattern: &Pattern, include_inferred: bool) -> Result<Vec<Statement>> {
        let txn = match &self.txn {
            Some(txn) => txn,
            None => return self.store.latest().statements(pattern, include_inferred),
        };
        let base = self.base()?;
        let mut out: Vec<Statement> = base
            .dataset()
            .matching(pattern)
            .filter(|st| !txn.removed.contains(*st))
            .cloned()
            .collect();
        let before = out.len();
        out.extend(
            txn.added
                .iter()
                .filter(|st| pattern.matches(st) && !base.contains(st))
                .cloned(),
        );
        if out.len() != before {
            out.sort_unstable();
        }
        Ok(out)
    }

    fn has_statement(&self, pattern: &Pattern, include_inferred: bool) -> Result<bool> {
        let txn = match &self.txn {
            Some(txn) => txn,
            None => return self.store.latest().has_statement(pattern, include_inferred),
        };
        if txn.added.iter().any(|st| pattern.matches(st)) {
            return Ok(true);
        }
        let base = self.base()?;
        let found = base
            .dataset()
            .matching(pattern)
            .any(|st| !txn.removed.contains(st));
        Ok(found)
    }

    fn len(&self) -> Result<usize> {
        let txn = match &self.txn {
            Some(txn) => txn,
            None => return Ok(self.store.latest().dataset().len()),
        };
        let base = self.base()?;
        let removed = txn.removed.iter().filter(|st| base.contains(st)).count();
        let added = txn.added.iter().filter(|st| !base.contains(st)).count();
        Ok(base.dataset().len() - removed + added)
    }
}

impl std::fmt::Debug for StoreConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnection")
            .field("store", &self.store.name)
            .field("txn_id", &self.txn.as_ref().map(|t| t.id))
            .field("isolation", &self.isolation_level())
            .finish()
    }
}
