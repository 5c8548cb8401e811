//! Read-preferring read/write lock manager
//!
//! Coordinates shape mutation, ordinary validating commits and serializable
//! validation store-wide.
//!
//! # Rules
//!
//! - Any number of readers may hold the lock together. A waiting writer does
//!   not stop new readers from entering (read-preferring).
//! - One writer at a time, and only when no reader holds the lock.
//! - Locks are not reentrant and read locks cannot be upgraded. Release the
//!   read lock and take the write lock instead.
//! - A write lock may be downgraded to a read lock without letting another
//!   writer in between ([`WriteLock::downgrade`]).
//! - Every acquisition records the owning connection and the calling thread.
//!   If the calling thread already holds a conflicting lock through another
//!   owner, waiting could never succeed, so acquisition fails immediately
//!   with [`Error::Deadlock`].
//!
//! Guards release on drop.

use parking_lot::{Condvar, Mutex};
use shaclstore_core::{Error, Result};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

/// Identifies the connection holding a lock
pub type OwnerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Holder {
    owner: OwnerId,
    thread: ThreadId,
}

impl Holder {
    fn current(owner: OwnerId) -> Self {
        Self {
            owner,
            thread: thread::current().id(),
        }
    }
}

#[derive(Debug, Default)]
struct LockState {
    readers: Vec<Holder>,
    writer: Option<Holder>,
}

#[derive(Debug, Default)]
struct LockInner {
    state: Mutex<LockState>,
    released: Condvar,
}

impl LockInner {
    fn release_read(&self, holder: Holder) {
        let mut state = self.state.lock();
        if let Some(pos) = state.readers.iter().position(|h| *h == holder) {
            state.readers.swap_remove(pos);
        }
        drop(state);
        self.released.notify_all();
    }

    fn release_write(&self, holder: Holder) {
        let mut state = self.state.lock();
        if state.writer == Some(holder) {
            state.writer = None;
        }
        drop(state);
        self.released.notify_all();
    }
}

/// Store-wide read/write lock
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    inner: Arc<LockInner>,
}

impl LockManager {
    /// Create an unlocked manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a shared lock for `owner`, blocking while a writer holds it.
    ///
    /// # Errors
    ///
    /// [`Error::Deadlock`] if the calling thread holds the write lock through
    /// another owner, [`Error::InvalidState`] if `owner` itself holds it.
    pub fn read_lock(&self, owner: OwnerId) -> Result<ReadLock> {
        let me = Holder::current(owner);
        let mut state = self.inner.state.lock();
        while let Some(writer) = state.writer {
            if writer.thread == me.thread {
                return Err(self_conflict(writer, owner, "read"));
            }
            debug!(target: "shaclstore::lock", owner, writer = writer.owner, "waiting for read lock");
            self.inner.released.wait(&mut state);
        }
        state.readers.push(me);
        Ok(ReadLock {
            inner: Arc::clone(&self.inner),
            holder: me,
            active: true,
        })
    }

    /// Acquire the exclusive lock for `owner`, blocking while any other lock
    /// is held.
    ///
    /// # Errors
    ///
    /// [`Error::Deadlock`] if the calling thread holds a read or write lock
    /// through another owner, [`Error::InvalidState`] if `owner` itself holds
    /// one.
    pub fn write_lock(&self, owner: OwnerId) -> Result<WriteLock> {
        let me = Holder::current(owner);
        let mut state = self.inner.state.lock();
        loop {
            if let Some(writer) = state.writer {
                if writer.thread == me.thread {
                    return Err(self_conflict(writer, owner, "write"));
                }
            } else if let Some(reader) = state.readers.iter().find(|r| r.thread == me.thread) {
                return Err(self_conflict(*reader, owner, "write"));
            } else if state.readers.is_empty() {
                break;
            }
            debug!(
                target: "shaclstore::lock",
                owner,
                readers = state.readers.len(),
                writer = ?state.writer.map(|w| w.owner),
                "waiting for write lock"
            );
            self.inner.released.wait(&mut state);
        }
        state.writer = Some(me);
        Ok(WriteLock {
            inner: Arc::clone(&self.inner),
            holder: me,
            active: true,
        })
    }

    /// True while a writer holds the lock
    pub fn is_write_locked(&self) -> bool {
        self.inner.state.lock().writer.is_some()
    }

    /// Number of read locks currently held
    pub fn reader_count(&self) -> usize {
        self.inner.state.lock().readers.len()
    }
}

fn self_conflict(held: Holder, owner: OwnerId, wanted: &str) -> Error {
    if held.owner == owner {
        return Error::invalid_state(format!(
            "connection {} already holds the lock and cannot re-acquire it for {}",
            owner, wanted
        ));
    }
    warn!(
        target: "shaclstore::lock",
        owner,
        holder = held.owner,
        wanted,
        "same-thread lock conflict"
    );
    Error::Deadlock(format!(
        "this thread holds the lock through connection {} which is still open; \
         connection {} cannot acquire the {} lock until it commits or rolls back",
        held.owner, owner, wanted
    ))
}

/// Shared lock guard
#[must_use = "the lock is released when the guard is dropped"]
#[derive(Debug)]
pub struct ReadLock {
    inner: Arc<LockInner>,
    holder: Holder,
    active: bool,
}

impl ReadLock {
    /// Connection that owns this lock
    pub fn owner(&self) -> OwnerId {
        self.holder.owner
    }

    /// Release explicitly
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if std::mem::take(&mut self.active) {
            self.inner.release_read(self.holder);
        }
    }
}

impl Drop for ReadLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Exclusive lock guard
#[must_use = "the lock is released when the guard is dropped"]
#[derive(Debug)]
pub struct WriteLock {
    inner: Arc<LockInner>,
    holder: Holder,
    active: bool,
}

impl WriteLock {
    /// Connection that owns this lock
    pub fn owner(&self) -> OwnerId {
        self.holder.owner
    }

    /// Release explicitly
    pub fn release(mut self) {
        if std::mem::take(&mut self.active) {
            self.inner.release_write(self.holder);
        }
    }

    /// Atomically trade the write lock for a read lock.
    ///
    /// No other writer can acquire the lock in between; waiting readers are
    /// woken.
    pub fn downgrade(mut self) -> ReadLock {
        let holder = self.holder;
        {
            let mut state = self.inner.state.lock();
            state.writer = None;
            state.readers.push(holder);
        }
        self.active = false;
        self.inner.released.notify_all();
        ReadLock {
            inner: Arc::clone(&self.inner),
            holder,
            active: true,
        }
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if std::mem::take(&mut self.active) {
            self.inner.release_write(self.holder);
        }
    }
}
