//! Validating connection
//!
//! A [`ShaclConnection`] wraps three store connections: the base connection
//! carrying the transaction, a previous-state connection pinned to the version
//! the transaction started from, and a connection on the shape store receiving
//! every write addressed to the reserved shapes graph.
//!
//! ## Lifecycle
//!
//! ```text
//! Inactive --begin--> Active --prepare--> Prepared --commit--> Inactive
//!                       |                    |
//!                       |                 rollback
//!                       +--prepare fails--> Failed --rollback--> Inactive
//! ```
//!
//! `commit` on an `Active` connection prepares first and rolls back if that
//! fails. Locks taken by `prepare` are held until the transaction ends.
//!
//! ## Validation modes
//!
//! - **Incremental**: a [`StatementDiff`] listener tracks the net effect and
//!   only focus nodes the transaction could have invalidated are checked
//! - **Bulk**: the base dataset was empty at `begin` (or the diff outgrew the
//!   transactional limit); every shape is validated against the whole store
//! - **Escalated**: under `snapshot` isolation with serializable validation
//!   enabled, prepare takes the exclusive lock and validates against the
//!   latest committed state with the transaction's writes replayed on top

use crate::settings::{Effective, TransactionSettings, ValidationApproach};
use crate::store::{ShapeList, StoreInner};
use shaclstore_concurrency::{FinalizedDiff, OwnerId, ReadLock, StatementDiff, WriteLock};
use shaclstore_core::vocab::{rdfs, SHAPES_GRAPH};
use shaclstore_core::{Error, GraphFilter, IsolationLevel, Pattern, Statement};
use shaclstore_shacl::{
    compile_shapes, validate_shapes, ConnectionsGroup, DiffMaterializer, MaterializedDiff,
    RdfsSubClassReasoner, Result, ResultLimits, ShaclError, ShapeKey, ValidationReport,
    ValidationSettings, ValidationStats,
};
use shaclstore_storage::{StatementListener, StatementSource, StoreConnection};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where a connection is in its transaction lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transaction
    Inactive,
    /// Transaction open, accepting writes
    Active,
    /// Validated; only commit or rollback remain
    Prepared,
    /// Validation failed or faulted; only rollback remains
    Failed,
}

struct Transaction {
    isolation: IsolationLevel,
    settings: TransactionSettings,
    effective: Effective,
    empty_before: bool,
    tracking: bool,
    shapes_changed: bool,
    refreshed: Option<ShapeList>,
    _read_lock: Option<ReadLock>,
    _write_lock: Option<WriteLock>,
}

impl Transaction {
    fn bulk(&self) -> bool {
        self.effective.approach == ValidationApproach::Bulk
    }
}

fn escalation_applies(serializable_validation: bool, isolation: IsolationLevel) -> bool {
    serializable_validation && isolation == IsolationLevel::Snapshot
}

fn is_shape_statement(statement: &Statement) -> bool {
    statement
        .graph
        .as_ref()
        .map_or(false, |g| g.matches_iri(SHAPES_GRAPH))
}

fn targets_shapes_graph(pattern: &Pattern) -> bool {
    matches!(&pattern.graph, GraphFilter::Named(g) if g.matches_iri(SHAPES_GRAPH))
}

/// Connection to a [`ShaclStore`](crate::ShaclStore)
pub struct ShaclConnection {
    id: OwnerId,
    store: Arc<StoreInner>,
    base: StoreConnection,
    previous: StoreConnection,
    shapes: StoreConnection,
    diff: Arc<StatementDiff>,
    listener: Arc<dyn StatementListener>,
    state: ConnectionState,
    txn: Option<Transaction>,
    last_stats: Option<ValidationStats>,
    closed: bool,
}

impl ShaclConnection {
    pub(crate) fn open(store: Arc<StoreInner>) -> Self {
        let id = store.connection_opened();
        let diff = Arc::new(StatementDiff::new());
        let listener: Arc<dyn StatementListener> = diff.clone();
        debug!(target: "shaclstore::txn", connection = id, "Connection opened");
        Self {
            id,
            base: store.data.connection(),
            previous: store.data.connection(),
            shapes: store.shapes_store.connection(),
            store,
            diff,
            listener,
            state: ConnectionState::Inactive,
            txn: None,
            last_stats: None,
            closed: false,
        }
    }

    /// Connection id, also its lock owner id
    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True while a transaction is open
    pub fn is_active(&self) -> bool {
        self.state != ConnectionState::Inactive
    }

    /// Isolation level of the open transaction
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.txn.as_ref().map(|t| t.isolation)
    }

    /// Statistics of the most recent validation pass
    pub fn last_validation_stats(&self) -> Option<&ValidationStats> {
        self.last_stats.as_ref()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed.into());
        }
        Ok(self.store.ensure_running()?)
    }

    fn ensure_writable(&self, operation: &'static str, what: impl ToString) -> Result<()> {
        self.ensure_open()?;
        match self.state {
            ConnectionState::Active => Ok(()),
            ConnectionState::Inactive => Err(Error::TransactionNotActive.into()),
            ConnectionState::Prepared | ConnectionState::Failed => Err(Error::DiffFinalized {
                operation,
                statement: what.to_string(),
            }
            .into()),
        }
    }

    fn txn_mut(&mut self) -> Result<&mut Transaction> {
        Ok(self.txn.as_mut().ok_or(Error::TransactionNotActive)?)
    }

    /// Begin a transaction at the configured default isolation level
    pub fn begin(&mut self) -> Result<()> {
        self.begin_with(TransactionSettings::default())
    }

    /// Begin a transaction with explicit settings
    pub fn begin_with(&mut self, settings: TransactionSettings) -> Result<()> {
        self.ensure_open()?;
        if self.state != ConnectionState::Inactive {
            return Err(Error::TransactionAlreadyActive.into());
        }
        let isolation = match settings.isolation {
            Some(level) => level,
            None => self.store.config.isolation_level()?,
        };

        if let Err(e) = self.open_transactions(isolation) {
            self.abort();
            return Err(e);
        }
        let empty_before = match self.base.is_empty() {
            Ok(empty) => empty,
            Err(e) => {
                self.abort();
                return Err(e.into());
            }
        };

        let escalation = escalation_applies(self.store.config.serializable_validation, isolation);
        let forced = (empty_before && !escalation).then_some(ValidationApproach::Bulk);
        let effective = Effective::resolve(self.store.defaults(), &settings, forced);
        let tracking = effective.approach == ValidationApproach::Auto;
        if tracking {
            self.diff.reset();
            if let Err(e) = self.base.add_listener(Arc::clone(&self.listener)) {
                self.abort();
                return Err(e.into());
            }
        }

        debug!(
            target: "shaclstore::txn",
            connection = self.id,
            %isolation,
            empty_before,
            approach = ?effective.approach,
            "Transaction started"
        );
        self.txn = Some(Transaction {
            isolation,
            settings,
            effective,
            empty_before,
            tracking,
            shapes_changed: false,
            refreshed: None,
            _read_lock: None,
            _write_lock: None,
        });
        self.state = ConnectionState::Active;
        Ok(())
    }

    fn open_transactions(&mut self, isolation: IsolationLevel) -> Result<()> {
        self.base.begin(isolation)?;
        let start = self.base.start_snapshot()?;
        self.previous.begin_pinned(isolation, start)?;
        self.shapes.begin(isolation)?;
        Ok(())
    }

    /// Add a statement. Statements in the shapes graph go to the shape store.
    pub fn add(&mut self, statement: Statement) -> Result<bool> {
        self.ensure_writable("add", &statement)?;
        if is_shape_statement(&statement) {
            let changed = self.shapes.add(statement)?;
            if changed {
                self.txn_mut()?.shapes_changed = true;
            }
            return Ok(changed);
        }
        let changed = self.base.add(statement)?;
        if changed {
            self.check_transactional_limit()?;
        }
        Ok(changed)
    }

    /// Remove a statement
    pub fn remove(&mut self, statement: &Statement) -> Result<bool> {
        self.ensure_writable("remove", statement)?;
        if is_shape_statement(statement) {
            let changed = self.shapes.remove(statement)?;
            if changed {
                self.txn_mut()?.shapes_changed = true;
            }
            return Ok(changed);
        }
        let changed = self.base.remove(statement)?;
        if changed {
            self.check_transactional_limit()?;
        }
        Ok(changed)
    }

    /// Remove every statement matching `pattern`
    pub fn remove_matching(&mut self, pattern: &Pattern) -> Result<usize> {
        self.ensure_writable("remove", pattern)?;
        if targets_shapes_graph(pattern) {
            let removed = self.shapes.remove_matching(pattern)?;
            if removed > 0 {
                self.txn_mut()?.shapes_changed = true;
            }
            return Ok(removed);
        }
        let removed = self.base.remove_matching(pattern)?;
        if removed > 0 {
            self.check_transactional_limit()?;
        }
        Ok(removed)
    }

    /// Remove every statement in the given graphs
    pub fn clear(&mut self, graph: GraphFilter) -> Result<usize> {
        self.remove_matching(&Pattern::any().graph(graph))
    }

    /// Statements matching `pattern`, seen through the open transaction
    pub fn statements(&self, pattern: &Pattern, include_inferred: bool) -> Result<Vec<Statement>> {
        self.ensure_open()?;
        Ok(self.source_for(pattern).statements(pattern, include_inferred)?)
    }

    /// True if any statement matches `pattern`
    pub fn has_statement(&self, pattern: &Pattern, include_inferred: bool) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.source_for(pattern).has_statement(pattern, include_inferred)?)
    }

    /// Number of data statements visible
    pub fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.base.len()?)
    }

    /// True if no data statements are visible
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn source_for(&self, pattern: &Pattern) -> &dyn StatementSource {
        if targets_shapes_graph(pattern) {
            &self.shapes
        } else {
            &self.base
        }
    }

    fn check_transactional_limit(&mut self) -> Result<()> {
        let limit = self.store.config.transactional_validation_limit;
        let serializable_validation = self.store.config.serializable_validation;
        let defaults = self.store.defaults();
        let txn = match self.txn.as_mut() {
            Some(txn) if txn.tracking => txn,
            _ => return Ok(()),
        };
        if self.diff.len() <= limit {
            return Ok(());
        }
        if escalation_applies(serializable_validation, txn.isolation) {
            debug!(
                target: "shaclstore::txn",
                connection = self.id,
                limit,
                "Transaction size limit exceeded, could not switch to bulk validation because serializable validation is enabled"
            );
            return Ok(());
        }
        self.base.remove_listener(&self.listener);
        self.diff.reset();
        txn.tracking = false;
        txn.effective = Effective::resolve(defaults, &txn.settings, Some(ValidationApproach::Bulk));
        debug!(
            target: "shaclstore::txn",
            connection = self.id,
            limit,
            "Transaction size limit exceeded, reverting to bulk validation"
        );
        Ok(())
    }

    /// Validate the transaction.
    ///
    /// Fails with [`ShaclError::ValidationFailed`] carrying the report if any
    /// shape is violated. The transaction then stays open and must be rolled
    /// back.
    pub fn prepare(&mut self) -> Result<()> {
        self.ensure_open()?;
        match self.state {
            ConnectionState::Inactive => return Err(Error::TransactionNotActive.into()),
            ConnectionState::Prepared => return Ok(()),
            ConnectionState::Failed => {
                return Err(Error::invalid_state(
                    "prepare after failed validation, roll back first",
                )
                .into())
            }
            ConnectionState::Active => {}
        }
        match self.run_prepare() {
            Ok(()) => {
                self.state = ConnectionState::Prepared;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                if e.is_validation_failure() {
                    debug!(target: "shaclstore::txn", connection = self.id, "Validation failed");
                } else {
                    warn!(target: "shaclstore::txn", connection = self.id, error = %e, "Prepare failed");
                }
                Err(e)
            }
        }
    }

    fn run_prepare(&mut self) -> Result<()> {
        let start = Instant::now();
        let store = Arc::clone(&self.store);
        let config = &store.config;
        let id = self.id;

        let txn = self.txn_mut()?;
        let (isolation, effective, tracking, shapes_changed, empty_before) = (
            txn.isolation,
            txn.effective,
            txn.tracking,
            txn.shapes_changed,
            txn.empty_before,
        );
        let bulk = txn.bulk();
        let escalate = escalation_applies(config.serializable_validation, isolation)
            && effective.approach == ValidationApproach::Auto;

        if escalate || shapes_changed {
            debug!(target: "shaclstore::lock", connection = id, escalate, shapes_changed, "Taking exclusive lock");
            txn._write_lock = Some(store.locks.write_lock(id)?);
        } else {
            txn._read_lock = Some(store.locks.read_lock(id)?);
        }

        let refreshed = if shapes_changed {
            Some(self.compile_pending_shapes()?)
        } else {
            None
        };
        self.txn_mut()?.refreshed = refreshed.clone();

        if effective.approach == ValidationApproach::Disabled {
            debug!(target: "shaclstore::validation", connection = id, "Validation skipped because validation was disabled");
            return Ok(());
        }

        let diff = if tracking {
            self.diff.finalize()
        } else {
            FinalizedDiff::default()
        };
        if refreshed.is_none() && !bulk && diff.is_empty() {
            debug!(target: "shaclstore::validation", connection = id, "Nothing has changed, nothing to validate");
            return Ok(());
        }

        let published = store.shapes.load();
        let subclass_changed = diff.touches_predicate(rdfs::SUB_CLASS_OF);
        let (shapes, validate_entire) = match refreshed {
            Some(list) if diff.is_empty() && !bulk => {
                let known: BTreeSet<&ShapeKey> = published.iter().map(|s| s.key()).collect();
                let changed: ShapeList = list.into_iter().filter(|s| !known.contains(s.key())).collect();
                debug!(
                    target: "shaclstore::validation",
                    connection = id,
                    changed = changed.len(),
                    "Only shapes changed, validating new and modified shapes"
                );
                (changed, true)
            }
            Some(list) => (list, true),
            None => (published.value().clone(), bulk || subclass_changed),
        };
        if shapes.is_empty() {
            debug!(target: "shaclstore::validation", connection = id, "Validation skipped because there are no shapes to validate");
            return Ok(());
        }

        let reasoner = if config.rdfs_subclass_reasoning {
            Some(Arc::new(RdfsSubClassReasoner::from_source(&self.base)?))
        } else {
            None
        };
        let executor = effective.parallel.then_some(&store.executor);
        let materialized = if bulk {
            MaterializedDiff::Bulk
        } else {
            DiffMaterializer::new(reasoner.clone(), executor).materialize(&diff)?
        };
        let settings = ValidationSettings {
            validate_entire,
            log_plans: config.log_validation_plans,
            performance_logging: config.performance_logging,
            log_violations: config.log_validation_violations,
            data_graph: GraphFilter::Any,
        };
        let limits = config.result_limits();

        let mut escalated = None;
        if escalate {
            let _monitor = store.single_connection_monitor.lock();
            if store.uses_single_connection() {
                debug!(target: "shaclstore::txn", connection = id, "Single connection in use, skipping serializable validation");
            } else {
                escalated = Some(self.validate_escalated(&shapes, &materialized, &settings, limits, effective)?);
            }
        }
        let was_escalated = escalated.is_some();
        let (report, mut stats) = match escalated {
            Some(outcome) => outcome,
            None => {
                let group = ConnectionsGroup::new(
                    &self.base,
                    Some(&self.previous as &dyn StatementSource),
                    &materialized,
                    reasoner,
                    GraphFilter::Any,
                    effective.cache,
                );
                validate_shapes(&shapes, &group, &settings, limits, executor)?
            }
        };

        let (added, removed) = materialized.sizes();
        stats.escalated = was_escalated;
        stats.empty_before_transaction = empty_before;
        stats.added = added;
        stats.removed = removed;
        if config.performance_logging {
            info!(
                target: "shaclstore::validation",
                connection = id,
                elapsed_ms = start.elapsed().as_millis() as u64,
                escalated = was_escalated,
                "Transaction validated"
            );
        }
        self.last_stats = Some(stats);

        if !report.conforms() {
            return Err(ShaclError::ValidationFailed(Box::new(report)));
        }
        Ok(())
    }

    /// Validate against the latest committed state with this transaction's
    /// explicit writes replayed on a fresh snapshot connection
    fn validate_escalated(
        &self,
        shapes: &ShapeList,
        materialized: &MaterializedDiff,
        settings: &ValidationSettings,
        limits: ResultLimits,
        effective: Effective,
    ) -> Result<(ValidationReport, ValidationStats)> {
        debug!(target: "shaclstore::txn", connection = self.id, "Escalating to serializable validation");
        let mut conn = self.store.data.connection();
        conn.begin(IsolationLevel::Snapshot)?;
        let outcome = self.replay_and_validate(&mut conn, shapes, materialized, settings, limits, effective);
        conn.rollback()?;
        outcome
    }

    fn replay_and_validate(
        &self,
        conn: &mut StoreConnection,
        shapes: &ShapeList,
        materialized: &MaterializedDiff,
        settings: &ValidationSettings,
        limits: ResultLimits,
        effective: Effective,
    ) -> Result<(ValidationReport, ValidationStats)> {
        let (added, removed) = match materialized {
            MaterializedDiff::Incremental { added, removed } => (added, removed),
            MaterializedDiff::Bulk => {
                return Err(Error::invalid_state("serializable validation needs a tracked diff").into())
            }
        };
        for statement in removed.explicit().dataset().iter() {
            conn.remove(statement)?;
        }
        for statement in added.explicit().dataset().iter() {
            conn.add(statement.clone())?;
        }

        let reasoner = if self.store.config.rdfs_subclass_reasoning {
            Some(Arc::new(RdfsSubClassReasoner::from_source(&*conn)?))
        } else {
            None
        };
        let executor = effective.parallel.then_some(&self.store.executor);
        let group = ConnectionsGroup::new(&*conn, None, materialized, reasoner, GraphFilter::Any, effective.cache);
        validate_shapes(shapes, &group, settings, limits, executor)
    }

    /// Validate every shape against the whole current view without ending
    /// the transaction
    pub fn revalidate(&mut self) -> Result<ValidationReport> {
        self.ensure_open()?;
        if self.state != ConnectionState::Active {
            return Err(Error::invalid_state("revalidate needs an active transaction").into());
        }
        let store = Arc::clone(&self.store);
        let (effective, shapes_changed) = {
            let txn = self.txn_mut()?;
            (txn.effective, txn.shapes_changed)
        };
        let _lock = store.locks.read_lock(self.id)?;
        let shapes = if shapes_changed {
            compile_shapes(&self.shapes)?
        } else {
            store.shapes.load().value().clone()
        };
        let reasoner = if store.config.rdfs_subclass_reasoning {
            Some(Arc::new(RdfsSubClassReasoner::from_source(&self.base)?))
        } else {
            None
        };
        let settings = ValidationSettings {
            validate_entire: true,
            log_plans: store.config.log_validation_plans,
            performance_logging: store.config.performance_logging,
            log_violations: store.config.log_validation_violations,
            data_graph: GraphFilter::Any,
        };
        let group = ConnectionsGroup::new(
            &self.base,
            None,
            &MaterializedDiff::Bulk,
            reasoner,
            GraphFilter::Any,
            effective.cache,
        );
        let executor = effective.parallel.then_some(&store.executor);
        let (report, stats) = validate_shapes(&shapes, &group, &settings, store.config.result_limits(), executor)?;
        self.last_stats = Some(stats);
        Ok(report)
    }

    /// Validate if needed, then commit.
    ///
    /// A failed validation rolls the transaction back and returns the failure.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        match self.state {
            ConnectionState::Inactive => return Err(Error::TransactionNotActive.into()),
            ConnectionState::Failed => {
                return Err(Error::invalid_state(
                    "commit after failed validation, the transaction must be rolled back",
                )
                .into())
            }
            ConnectionState::Active => {
                if let Err(e) = self.prepare() {
                    self.abort();
                    return Err(e);
                }
            }
            ConnectionState::Prepared => {}
        }
        let result = self.commit_prepared();
        if result.is_err() {
            self.abort();
        } else {
            self.finish();
        }
        result
    }

    /// Compile the shapes this transaction would leave behind.
    ///
    /// The pending shape changes are replayed over the latest committed
    /// shapes rather than the snapshot the transaction started from, so that
    /// shapes committed concurrently are kept. Callers hold the write lock,
    /// which keeps the shapes store still until commit.
    fn compile_pending_shapes(&self) -> Result<ShapeList> {
        let (added, removed) = self.shapes.pending_statements();
        let mut latest = self.store.shapes_store.connection();
        latest.begin(IsolationLevel::ReadCommitted)?;
        for statement in &removed {
            latest.remove(statement)?;
        }
        for statement in added {
            latest.add(statement)?;
        }
        let compiled = compile_shapes(&latest);
        latest.rollback()?;
        Ok(compiled?)
    }

    fn commit_prepared(&mut self) -> Result<()> {
        let txn = self.txn_mut()?;
        let refreshed = txn.refreshed.take();
        let shapes_changed = txn.shapes_changed;

        // nothing may be published if the shapes commit would be refused
        if shapes_changed {
            self.shapes.check_commit()?;
        }
        self.previous.rollback()?;
        let version = self.base.commit()?;
        if shapes_changed {
            self.shapes.commit()?;
        } else {
            self.shapes.rollback()?;
        }
        if let Some(list) = refreshed {
            let count = list.len();
            let generation = self.store.shapes.publish(list);
            debug!(target: "shaclstore::txn", connection = self.id, generation, shapes = count, "Published shapes");
        }
        debug!(target: "shaclstore::txn", connection = self.id, version, "Transaction committed");
        Ok(())
    }

    /// Discard the open transaction
    pub fn rollback(&mut self) -> Result<()> {
        if self.state == ConnectionState::Inactive {
            return Err(Error::TransactionNotActive.into());
        }
        let result = self.rollback_all();
        self.finish();
        debug!(target: "shaclstore::txn", connection = self.id, "Transaction rolled back");
        result
    }

    fn rollback_all(&mut self) -> Result<()> {
        for conn in [&mut self.base, &mut self.previous, &mut self.shapes] {
            if conn.is_active() {
                conn.rollback()?;
            }
        }
        Ok(())
    }

    fn abort(&mut self) {
        if let Err(e) = self.rollback_all() {
            warn!(target: "shaclstore::txn", connection = self.id, error = %e, "Rollback during cleanup failed");
        }
        self.finish();
    }

    /// Release locks, reset the diff and return to `Inactive`
    fn finish(&mut self) {
        self.txn = None;
        self.diff.reset();
        self.state = ConnectionState::Inactive;
    }

    /// Roll back any open transaction and close the connection
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = if self.state != ConnectionState::Inactive {
            self.rollback()
        } else {
            Ok(())
        };
        self.closed = true;
        self.store.connection_closed();
        debug!(target: "shaclstore::txn", connection = self.id, "Connection closed");
        result
    }
}

impl Drop for ShaclConnection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(target: "shaclstore::txn", connection = self.id, error = %e, "Error closing connection");
        }
    }
}

impl std::fmt::Debug for ShaclConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaclConnection")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("closed", &self.closed)
            .finish()
    }
}
