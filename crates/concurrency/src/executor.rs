//! Store-wide worker pool for parallel validation
//!
//! The pool is created lazily on first use, shared by every validation pass
//! of the store, and torn down only by [`ValidationExecutor::shutdown`].
//! Workers are named `shacl-validation-0`, `shacl-validation-1`, etc.
//!
//! Tasks are fanned out with rayon and joined before returning, so a call
//! blocks until every task finished or one of them failed. Results keep the
//! input order.

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use shaclstore_core::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Executor metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorStats {
    /// Configured number of worker threads.
    pub worker_count: usize,
    /// True once the pool has been created.
    pub started: bool,
    /// Total number of tasks run since creation.
    pub tasks_completed: u64,
}

/// Lazily started, bounded worker pool
pub struct ValidationExecutor {
    pool: Mutex<Option<Arc<ThreadPool>>>,
    num_threads: usize,
    shutdown: AtomicBool,
    tasks_completed: AtomicU64,
}

impl ValidationExecutor {
    /// Create an executor with `num_threads` workers (at least one)
    pub fn new(num_threads: usize) -> Self {
        Self {
            pool: Mutex::new(None),
            num_threads: num_threads.max(1),
            shutdown: AtomicBool::new(false),
            tasks_completed: AtomicU64::new(0),
        }
    }

    /// Size the pool to the machine's available parallelism
    pub fn with_available_parallelism() -> Self {
        Self::new(std::thread::available_parallelism().map_or(1, |n| n.get()))
    }

    fn pool(&self) -> Result<Arc<ThreadPool>> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::Shutdown);
        }
        let mut slot = self.pool.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(Arc::clone(pool));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .thread_name(|i| format!("shacl-validation-{}", i))
            .build()
            .map_err(|e| Error::invalid_state(format!("failed to start validation workers: {}", e)))?;
        debug!(target: "shaclstore::validation", workers = self.num_threads, "validation pool started");
        let pool = Arc::new(pool);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Run `task` over every item in parallel and collect the results in
    /// input order. The first error wins.
    pub fn map<T, R, E, F>(&self, items: &[T], task: F) -> std::result::Result<Vec<R>, E>
    where
        T: Sync,
        R: Send,
        E: From<Error> + Send,
        F: Fn(&T) -> std::result::Result<R, E> + Sync + Send,
    {
        let pool = self.pool()?;
        let out = pool.install(|| items.par_iter().map(&task).collect::<std::result::Result<Vec<R>, E>>());
        self.tasks_completed
            .fetch_add(items.len() as u64, Ordering::Relaxed);
        out
    }

    /// Run two closures concurrently and return both results
    pub fn join<A, B, RA, RB>(&self, a: A, b: B) -> Result<(RA, RB)>
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send,
        RB: Send,
    {
        let pool = self.pool()?;
        let out = pool.join(a, b);
        self.tasks_completed.fetch_add(2, Ordering::Relaxed);
        Ok(out)
    }

    /// Stop the pool. Later calls fail with [`Error::Shutdown`].
    ///
    /// Workers exit once tasks already submitted have finished.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        if self.pool.lock().take().is_some() {
            debug!(target: "shaclstore::validation", "validation pool stopped");
        }
    }

    /// True after `shutdown`
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Return a snapshot of executor metrics.
    pub fn stats(&self) -> ExecutorStats {
        ExecutorStats {
            worker_count: self.num_threads,
            started: self.pool.lock().is_some(),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ValidationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationExecutor")
            .field("stats", &self.stats())
            .finish()
    }
}
