//! The validating store
//!
//! [`ShaclStore`] owns the data store, the shape store, the lock manager, the
//! published shape list and the validation worker pool. Connections are cheap
//! handles onto it.
//!
//! ## Single-connection detection
//!
//! A counter tracks open connections. It goes up on every open but only comes
//! back down from one to zero, so once two connections have been open at the
//! same time the store never again counts as single-connection. Escalated
//! validation is skipped only while a single connection has ever been in use
//! at a time.

use crate::config::ShaclConfig;
use crate::connection::ShaclConnection;
use crate::settings::{Effective, ValidationApproach};
use parking_lot::Mutex;
use shaclstore_concurrency::{LockManager, OwnerId, Published, ValidationExecutor};
use shaclstore_core::{Error, Result, Statement};
use shaclstore_shacl::Shape;
use shaclstore_storage::MemoryStore;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Compiled shapes, in validation order
pub type ShapeList = Vec<Arc<Shape>>;

pub(crate) struct StoreInner {
    pub(crate) config: ShaclConfig,
    pub(crate) data: MemoryStore,
    pub(crate) shapes_store: MemoryStore,
    pub(crate) locks: LockManager,
    pub(crate) shapes: Published<ShapeList>,
    pub(crate) executor: ValidationExecutor,
    pub(crate) single_connection_monitor: Mutex<()>,
    connection_counter: AtomicU64,
    next_connection_id: AtomicU64,
    shutdown: AtomicBool,
}

impl StoreInner {
    pub(crate) fn connection_opened(&self) -> OwnerId {
        {
            let _monitor = self.single_connection_monitor.lock();
            self.connection_counter.fetch_add(1, Ordering::SeqCst);
        }
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn connection_closed(&self) {
        let _ = self
            .connection_counter
            .compare_exchange(1, 0, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Only meaningful while the caller holds `single_connection_monitor`
    pub(crate) fn uses_single_connection(&self) -> bool {
        self.connection_counter.load(Ordering::SeqCst) == 1
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_running(&self) -> Result<()> {
        if self.is_shut_down() {
            Err(Error::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Store-level defaults before any per-transaction request
    pub(crate) fn defaults(&self) -> Effective {
        Effective {
            approach: if self.config.validation_enabled {
                ValidationApproach::Auto
            } else {
                ValidationApproach::Disabled
            },
            parallel: self.config.parallel_validation,
            cache: self.config.cache_select_nodes,
        }
    }
}

/// Transactional store validating every commit against its shapes graph
#[derive(Clone)]
pub struct ShaclStore {
    inner: Arc<StoreInner>,
}

impl ShaclStore {
    /// Create an empty store
    pub fn new(config: ShaclConfig) -> Result<Self> {
        config.validate()?;
        let workers = config.worker_count();
        info!(
            target: "shaclstore::store",
            validation_enabled = config.validation_enabled,
            serializable_validation = config.serializable_validation,
            workers,
            "Opening SHACL store"
        );
        Ok(Self {
            inner: Arc::new(StoreInner {
                data: MemoryStore::new("data"),
                shapes_store: MemoryStore::new("shapes"),
                locks: LockManager::new(),
                shapes: Published::new(ShapeList::new()),
                executor: ValidationExecutor::new(workers),
                single_connection_monitor: Mutex::new(()),
                connection_counter: AtomicU64::new(0),
                next_connection_id: AtomicU64::new(1),
                shutdown: AtomicBool::new(false),
                config,
            }),
        })
    }

    /// Create a store with default configuration
    pub fn with_defaults() -> Result<Self> {
        Self::new(ShaclConfig::default())
    }

    /// Open a connection
    pub fn connection(&self) -> Result<ShaclConnection> {
        self.inner.ensure_running()?;
        Ok(ShaclConnection::open(Arc::clone(&self.inner)))
    }

    /// Configuration the store runs with
    pub fn config(&self) -> &ShaclConfig {
        &self.inner.config
    }

    /// Shapes currently in force
    pub fn shapes(&self) -> ShapeList {
        self.inner.shapes.load().value().clone()
    }

    /// Generation of the published shape list; bumps on every shape commit
    pub fn shapes_generation(&self) -> u64 {
        self.inner.shapes.generation()
    }

    /// Committed data statements
    pub fn statements(&self) -> Vec<Statement> {
        self.inner.data.snapshot().dataset().iter().cloned().collect()
    }

    /// Committed shapes-graph statements
    pub fn shape_statements(&self) -> Vec<Statement> {
        self.inner.shapes_store.snapshot().dataset().iter().cloned().collect()
    }

    /// Stop the worker pool; later connection requests fail with
    /// [`Error::Shutdown`]
    pub fn shutdown(&self) {
        if !self.inner.shutdown.swap(true, Ordering::AcqRel) {
            self.inner.executor.shutdown();
            debug!(target: "shaclstore::store", "SHACL store shut down");
        }
    }

    /// True after `shutdown`
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }
}

impl std::fmt::Debug for ShaclStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaclStore")
            .field("data", &self.inner.data)
            .field("shapes_generation", &self.shapes_generation())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
