//! Execution-context identity used to detect forks and invalidation

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique id for a newly built pool
pub(crate) fn next_pool_id() -> u64 {
    NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Source of the current process identifier
///
/// The pool compares this against the pid it was initialised under to notice
/// that it now runs in a forked child.
pub trait ProcessIdentity: Send + Sync + 'static {
    fn current_pid(&self) -> u32;
}

/// The real operating system process
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProcess;

impl ProcessIdentity for OsProcess {
    fn current_pid(&self) -> u32 {
        std::process::id()
    }
}

impl<T: ProcessIdentity> ProcessIdentity for std::sync::Arc<T> {
    fn current_pid(&self) -> u32 {
        (**self).current_pid()
    }
}

/// The context a resource (or the pool itself) belongs to
///
/// `pool` identifies the pool that created the resource, so a lease cannot be
/// handed back to a different pool. `epoch` advances whenever the pool is
/// invalidated or torn down without a process change, so resources from
/// before that point compare unequal too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner {
    pool: u64,
    pid: u32,
    epoch: u64,
}

impl Owner {
    pub(crate) fn new(pool: u64, pid: u32, epoch: u64) -> Self {
        Self { pool, pid, epoch }
    }

    pub fn pool_id(&self) -> u64 {
        self.pool
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn next_epoch(self) -> Self {
        Self {
            epoch: self.epoch + 1,
            ..self
        }
    }

    pub(crate) fn with_pid(self, pid: u32) -> Self {
        Self {
            pid,
            epoch: self.epoch + 1,
            ..self
        }
    }
}
