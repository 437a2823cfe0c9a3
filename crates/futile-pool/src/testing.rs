//! Mock resources shared by the unit tests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use futile_core::{ConnectParams, FutileError, Resource, Result, StatementResult};
use parking_lot::Mutex;

use crate::pool::{PoolConfig, ProcessIdentity, ResourceFactory, ResourcePool};

/// Mock connection for testing
pub(crate) struct MockResource {
    pub(crate) id: usize,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    broken: AtomicBool,
}

impl MockResource {
    fn new(id: usize) -> Self {
        Self {
            id,
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
            broken: AtomicBool::new(false),
        }
    }

    pub(crate) fn break_connection(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl Resource for MockResource {
    fn kind(&self) -> &str {
        "mock"
    }

    fn execute(&self, _statement: &str) -> Result<StatementResult> {
        if self.broken.load(Ordering::SeqCst) || self.is_closed() {
            return Err(FutileError::Connection("server has gone away".into()));
        }
        Ok(StatementResult::affected(1))
    }

    fn begin(&self) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Mock factory that counts creations and records closes
#[derive(Default)]
pub(crate) struct MockFactory {
    counter: AtomicUsize,
    failures_left: AtomicUsize,
    fail_close: AtomicBool,
    closed_ids: Mutex<Vec<usize>>,
}

impl MockFactory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` creations fail
    pub(crate) fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    pub(crate) fn closed_ids(&self) -> Vec<usize> {
        let mut ids = self.closed_ids.lock().clone();
        ids.sort_unstable();
        ids
    }
}

impl ResourceFactory for MockFactory {
    type Resource = MockResource;

    fn create(&self, _params: &ConnectParams) -> Result<MockResource> {
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(FutileError::ResourceCreation("connection refused".into()));
        }
        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(MockResource::new(id))
    }

    fn close(&self, resource: &MockResource) -> Result<()> {
        self.closed_ids.lock().push(resource.id);
        resource.close()?;
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(FutileError::Connection("close failed".into()));
        }
        Ok(())
    }
}

/// Process identity whose pid tests can change to simulate a fork
pub(crate) struct MockProcess {
    pid: AtomicU32,
}

impl MockProcess {
    pub(crate) fn new(pid: u32) -> Arc<Self> {
        Arc::new(Self {
            pid: AtomicU32::new(pid),
        })
    }

    pub(crate) fn fork_to(&self, pid: u32) {
        self.pid.store(pid, Ordering::SeqCst);
    }
}

impl ProcessIdentity for MockProcess {
    fn current_pid(&self) -> u32 {
        self.pid.load(Ordering::SeqCst)
    }
}

pub(crate) fn mock_pool(config: PoolConfig) -> ResourcePool<MockFactory> {
    ResourcePool::new(config, MockFactory::new())
}

pub(crate) fn forkable_pool(
    config: PoolConfig,
    pid: u32,
) -> (ResourcePool<MockFactory>, Arc<MockProcess>) {
    let process = MockProcess::new(pid);
    let pool = ResourcePool::with_identity(config, MockFactory::new(), process.clone());
    (pool, process)
}
