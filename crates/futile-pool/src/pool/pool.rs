//! Resource pool implementation

use std::mem;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futile_core::{FutileError, Resource, Result};
use parking_lot::{Condvar, Mutex};

use super::config::PoolConfig;
use super::factory::ResourceFactory;
use super::lease::{Pooled, PooledResource};
use super::owner::{OsProcess, Owner, ProcessIdentity, next_pool_id};
use super::stats::PoolStats;

/// One entry of the free list
enum Slot<R> {
    /// Permission to create one more resource
    Vacant,
    /// A created resource waiting to be reused
    Idle(IdleResource<R>),
}

struct IdleResource<R> {
    resource: Arc<R>,
    created_at: Instant,
    idle_since: Instant,
}

/// Everything guarded by the pool lock
struct PoolState<R> {
    owner: Owner,
    /// LIFO stack, the top is the end of the vector
    free: Vec<Slot<R>>,
    /// Every live resource created under `owner`
    registry: Vec<Weak<R>>,
    /// Items popped from `free` and not yet returned
    leased: usize,
    /// Leases from an earlier epoch whose slot comes back when they return
    stale_leased: usize,
    /// Oldest epoch whose stale leases still hold a slot
    reclaim_floor: u64,
    waiting: usize,
}

impl<R> PoolState<R> {
    fn register(&mut self, resource: &Arc<R>) {
        self.registry.retain(|entry| entry.strong_count() > 0);
        self.registry.push(Arc::downgrade(resource));
    }

    /// Give back the slot held by a lease from an earlier epoch of this pool
    fn reclaim_stale(&mut self, owner: Owner, max_size: usize) -> bool {
        let reclaimable = owner.pool_id() == self.owner.pool_id()
            && owner.pid() == self.owner.pid()
            && owner.epoch() >= self.reclaim_floor
            && owner.epoch() < self.owner.epoch()
            && self.stale_leased > 0;
        if !reclaimable {
            return false;
        }

        self.stale_leased -= 1;
        if self.free.len() < max_size {
            self.free.push(Slot::Vacant);
        }
        true
    }

    fn idle_count(&self) -> usize {
        self.free
            .iter()
            .filter(|slot| matches!(slot, Slot::Idle(_)))
            .count()
    }
}

fn vacant_slots<R>(count: usize) -> Vec<Slot<R>> {
    (0..count).map(|_| Slot::Vacant).collect()
}

/// A bounded pool of reusable resources
///
/// The pool starts with `max_size` vacant slots and creates resources lazily
/// through its [`ResourceFactory`]. Released resources are stacked on top of
/// the remaining slots, so a warm resource is always preferred over creating
/// a new one.
///
/// Resources created in another process (after a fork) or before an
/// [`invalidate`](Self::invalidate) are never handed out again.
pub struct ResourcePool<F: ResourceFactory> {
    id: u64,
    config: PoolConfig,
    factory: F,
    identity: Box<dyn ProcessIdentity>,
    state: Mutex<PoolState<F::Resource>>,
    /// Signalled whenever an item is pushed onto the free list
    available: Condvar,
    /// Mirror of `state.owner.pid()` for the lock-free fork check
    owner_pid: AtomicU32,
    /// Serializes resets so only one thread rebuilds the free list
    reset_lock: Mutex<()>,
    created: AtomicU64,
    creation_failures: AtomicU64,
    timeouts: AtomicU64,
    resets: AtomicU64,
}

impl<F: ResourceFactory> ResourcePool<F> {
    /// Create a new pool for the current process
    pub fn new(config: PoolConfig, factory: F) -> Self {
        Self::with_identity(config, factory, OsProcess)
    }

    /// Create a new pool that reads the current pid from `identity`
    pub fn with_identity<I: ProcessIdentity>(config: PoolConfig, factory: F, identity: I) -> Self {
        let id = next_pool_id();
        let pid = identity.current_pid();
        let owner = Owner::new(id, pid, 0);
        let max_size = config.max_size();

        tracing::debug!(
            max_size,
            acquire_timeout_ms = config.acquire_timeout().as_millis() as u64,
            pid,
            pool_id = id,
            "creating resource pool"
        );

        Self {
            state: Mutex::new(PoolState {
                owner,
                free: vacant_slots(max_size),
                registry: Vec::new(),
                leased: 0,
                stale_leased: 0,
                reclaim_floor: 0,
                waiting: 0,
            }),
            id,
            config,
            factory,
            identity: Box::new(identity),
            available: Condvar::new(),
            owner_pid: AtomicU32::new(pid),
            reset_lock: Mutex::new(()),
            created: AtomicU64::new(0),
            creation_failures: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            resets: AtomicU64::new(0),
        }
    }

    /// Acquire a resource, waiting up to the configured acquire timeout
    pub fn acquire(&self) -> Result<Pooled<F::Resource>> {
        self.acquire_timeout(self.config.acquire_timeout())
    }

    /// Acquire a resource, waiting up to `timeout`
    ///
    /// This will:
    /// 1. Reset the pool if it now runs in a different process
    /// 2. Pop the most recently released item, waiting if the free list is empty
    /// 3. Reuse an idle resource, or create a new one for a vacant slot
    ///
    /// Returns `PoolExhausted` if nothing became available in time. Errors
    /// from the factory are returned unchanged and the slot is given back.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<Pooled<F::Resource>> {
        self.check_owner();

        let (slot, owner) = self.pop_free(timeout)?;
        match slot {
            Slot::Idle(idle) => {
                if self.is_reusable(&idle, Instant::now()) {
                    tracing::trace!(kind = idle.resource.kind(), "reusing idle resource");
                    return Ok(Pooled::new(idle.resource, owner, idle.created_at));
                }
                tracing::debug!(
                    kind = idle.resource.kind(),
                    "idle resource expired or failed validation, replacing it"
                );
                self.close_quietly(&idle.resource);
                drop(idle);
                self.create_resource(owner)
            }
            Slot::Vacant => self.create_resource(owner),
        }
    }

    /// Get a resource that is released automatically when dropped
    pub fn get(&self) -> Result<PooledResource<'_, F>> {
        Ok(PooledResource::new(self.acquire()?, self))
    }

    /// Like [`get`](Self::get) with an explicit timeout
    pub fn get_timeout(&self, timeout: Duration) -> Result<PooledResource<'_, F>> {
        Ok(PooledResource::new(self.acquire_timeout(timeout)?, self))
    }

    /// Return a resource to the pool
    ///
    /// Resources from a previous owner or another pool are dropped without
    /// being closed.
    /// Never blocks beyond the pool lock and never fails.
    pub fn release(&self, lease: Pooled<F::Resource>) {
        self.check_owner();

        let (resource, owner, created_at) = lease.into_parts();
        let mut state = self.state.lock();

        if owner != state.owner {
            let inherited = owner.pid() != state.owner.pid();
            let reclaimed = !inherited && state.reclaim_stale(owner, self.config.max_size());
            drop(state);
            if reclaimed {
                self.available.notify_one();
            }
            if owner.pool_id() != self.id {
                tracing::warn!(
                    pool_id = self.id,
                    resource_pool_id = owner.pool_id(),
                    "released resource belongs to another pool, dropping it"
                );
            } else {
                tracing::debug!(
                    resource_pid = owner.pid(),
                    resource_epoch = owner.epoch(),
                    "dropping resource from a previous pool owner"
                );
            }
            if inherited {
                // Shares descriptors with the parent process; its destructor must not run here.
                mem::forget(resource);
            }
            return;
        }

        state.leased = state.leased.saturating_sub(1);
        if state.free.len() >= self.config.max_size() {
            drop(state);
            tracing::warn!(
                max_size = self.config.max_size(),
                "free list already full, dropping released resource"
            );
            return;
        }

        state.free.push(Slot::Idle(IdleResource {
            resource,
            created_at,
            idle_since: Instant::now(),
        }));
        drop(state);
        self.available.notify_one();
    }

    /// Close a broken resource instead of returning it
    ///
    /// The slot it occupied becomes vacant again so the pool keeps its capacity.
    pub fn discard(&self, lease: Pooled<F::Resource>) {
        let (resource, owner, _) = lease.into_parts();

        if owner.pid() != self.identity.current_pid() {
            mem::forget(resource);
            return;
        }
        if owner.pool_id() != self.id {
            tracing::warn!(
                pool_id = self.id,
                resource_pool_id = owner.pool_id(),
                "discarded resource belongs to another pool, dropping it"
            );
            return;
        }

        tracing::debug!(kind = resource.kind(), "discarding resource");
        self.close_quietly(&resource);
        drop(resource);
        self.restore_vacant(owner);
    }

    /// Close every resource the pool has created, including leased ones
    ///
    /// Close failures are logged and ignored. The free list is left empty,
    /// so the pool hands out nothing afterwards; build a new pool to continue.
    pub fn disconnect_all(&self) {
        self.check_owner();

        let (registry, free) = {
            let mut state = self.state.lock();
            state.owner = state.owner.next_epoch();
            state.leased = 0;
            state.stale_leased = 0;
            state.reclaim_floor = state.owner.epoch();
            (mem::take(&mut state.registry), mem::take(&mut state.free))
        };

        let mut closed = 0usize;
        for resource in registry.iter().filter_map(Weak::upgrade) {
            self.close_quietly(&resource);
            closed += 1;
        }
        drop(free);

        tracing::info!(closed, "disconnected all pooled resources");
    }

    /// Discard every resource and start over with fresh vacant slots
    ///
    /// Idle resources are dropped without being closed. Leased ones are not
    /// taken back when released or discarded, but their slots are, so
    /// `max_size` still bounds the live resources. Use this when the resources
    /// belong to a context that is no longer valid (e.g. the server side
    /// restarted).
    pub fn invalidate(&self) {
        let _reset = self.reset_lock.lock();
        let owner = self.state.lock().owner.next_epoch();
        tracing::info!(epoch = owner.epoch(), "invalidating pooled resources");
        self.reset(owner, false);
    }

    /// Close all idle resources, keeping their slots
    ///
    /// Returns the number of resources closed.
    pub fn close_idle(&self) -> usize {
        self.check_owner();
        self.take_idle(|_| true)
    }

    /// Close idle resources past their idle timeout or max lifetime
    ///
    /// Returns the number of resources closed.
    pub fn evict_expired(&self) -> usize {
        self.check_owner();
        let now = Instant::now();
        self.take_idle(|idle| self.is_expired(idle, now))
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        let idle = state.idle_count();
        let vacant = state.free.len() - idle;
        PoolStats::new(
            self.config.max_size(),
            idle,
            state.leased + state.stale_leased,
            vacant,
            state.waiting,
        )
        .with_counters(
            self.created.load(Ordering::Relaxed),
            self.creation_failures.load(Ordering::Relaxed),
            self.timeouts.load(Ordering::Relaxed),
            self.resets.load(Ordering::Relaxed),
        )
    }

    /// The context the pool currently belongs to
    pub fn owner(&self) -> Owner {
        self.state.lock().owner
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Get the resource factory
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Reset the pool if it is now running in a different process
    fn check_owner(&self) {
        let pid = self.identity.current_pid();
        if pid == self.owner_pid.load(Ordering::Acquire) {
            return;
        }

        let _reset = self.reset_lock.lock();
        let previous_pid = self.owner_pid.load(Ordering::Acquire);
        if pid == previous_pid {
            // Another thread already reset the pool while we waited on the lock.
            return;
        }

        let owner = self.state.lock().owner.with_pid(pid);
        tracing::info!(
            previous_pid,
            pid,
            "process change detected, discarding inherited resources"
        );
        self.reset(owner, true);
    }

    /// Rebuild the free list for `owner`. Callers hold `reset_lock`.
    ///
    /// Leases of an inherited pool never come back, while leases from this
    /// process keep their slot until they are released.
    fn reset(&self, owner: Owner, inherited: bool) {
        let (free, registry) = {
            let mut state = self.state.lock();
            state.owner = owner;
            if inherited {
                state.stale_leased = 0;
                state.reclaim_floor = owner.epoch();
            } else {
                state.stale_leased += state.leased;
            }
            state.leased = 0;
            let vacant = self.config.max_size().saturating_sub(state.stale_leased);
            let free = mem::replace(&mut state.free, vacant_slots(vacant));
            (free, mem::take(&mut state.registry))
        };
        self.owner_pid.store(owner.pid(), Ordering::Release);
        self.resets.fetch_add(1, Ordering::Relaxed);
        self.available.notify_all();

        tracing::debug!(
            discarded = registry.len(),
            pid = owner.pid(),
            epoch = owner.epoch(),
            "pool reset"
        );

        if inherited {
            mem::forget(free);
        }
    }

    /// Pop the top of the free list, waiting up to `timeout` for an item
    fn pop_free(&self, timeout: Duration) -> Result<(Slot<F::Resource>, Owner)> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        state.waiting += 1;

        let slot = loop {
            if let Some(slot) = state.free.pop() {
                break slot;
            }
            match deadline {
                Some(deadline) if Instant::now() >= deadline => {
                    state.waiting -= 1;
                    drop(state);
                    self.timeouts.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        max_size = self.config.max_size(),
                        timeout_ms = timeout.as_millis() as u64,
                        "no resource available before the acquire deadline"
                    );
                    return Err(FutileError::PoolExhausted {
                        max_size: self.config.max_size(),
                        timeout,
                    });
                }
                Some(deadline) => {
                    self.available.wait_until(&mut state, deadline);
                }
                None => self.available.wait(&mut state),
            }
        };

        state.waiting -= 1;
        state.leased += 1;
        Ok((slot, state.owner))
    }

    /// Turn a vacant slot into a new resource
    fn create_resource(&self, owner: Owner) -> Result<Pooled<F::Resource>> {
        match self.factory.create(self.config.params()) {
            Ok(resource) => {
                let resource = Arc::new(resource);
                let total_created = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                {
                    let mut state = self.state.lock();
                    if state.owner == owner {
                        state.register(&resource);
                    }
                }
                tracing::debug!(
                    kind = resource.kind(),
                    total_created,
                    "created pooled resource"
                );
                Ok(Pooled::new(resource, owner, Instant::now()))
            }
            Err(err) => {
                self.creation_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %err, "resource creation failed, restoring slot");
                self.restore_vacant(owner);
                Err(err)
            }
        }
    }

    /// Give back the slot of a resource that will not return
    fn restore_vacant(&self, owner: Owner) {
        {
            let mut state = self.state.lock();
            if state.owner != owner {
                if !state.reclaim_stale(owner, self.config.max_size()) {
                    return;
                }
            } else {
                state.leased = state.leased.saturating_sub(1);
                if state.free.len() >= self.config.max_size() {
                    return;
                }
                state.free.push(Slot::Vacant);
            }
        }
        self.available.notify_one();
    }

    /// Replace matching idle resources with vacant slots and close them
    fn take_idle(&self, mut predicate: impl FnMut(&IdleResource<F::Resource>) -> bool) -> usize {
        let taken: Vec<Arc<F::Resource>> = {
            let mut state = self.state.lock();
            let mut taken = Vec::new();
            for slot in state.free.iter_mut() {
                let hit = matches!(&*slot, Slot::Idle(idle) if predicate(idle));
                if hit {
                    if let Slot::Idle(idle) = mem::replace(slot, Slot::Vacant) {
                        taken.push(idle.resource);
                    }
                }
            }
            taken
        };

        for resource in &taken {
            self.close_quietly(resource);
        }
        if !taken.is_empty() {
            tracing::debug!(closed = taken.len(), "closed idle resources");
        }
        taken.len()
    }

    fn is_expired(&self, idle: &IdleResource<F::Resource>, now: Instant) -> bool {
        let idle_expired = self
            .config
            .idle_timeout()
            .is_some_and(|timeout| now.saturating_duration_since(idle.idle_since) >= timeout);
        let lifetime_expired = self
            .config
            .max_lifetime()
            .is_some_and(|lifetime| now.saturating_duration_since(idle.created_at) >= lifetime);
        idle_expired || lifetime_expired
    }

    fn is_reusable(&self, idle: &IdleResource<F::Resource>, now: Instant) -> bool {
        if self.is_expired(idle, now) {
            return false;
        }
        !self.config.test_on_checkout() || self.factory.is_valid(&idle.resource)
    }

    fn close_quietly(&self, resource: &F::Resource) {
        if let Err(err) = self.factory.close(resource) {
            tracing::warn!(
                kind = resource.kind(),
                error = %err,
                "failed to close pooled resource, ignoring"
            );
        }
    }
}
