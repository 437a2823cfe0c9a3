//! Leases handed out by the pool

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::factory::ResourceFactory;
use super::owner::Owner;
use super::pool::ResourcePool;

/// A resource lent out by the pool
///
/// Exactly one caller holds a `Pooled` at a time. Hand it back with
/// [`ResourcePool::release`], or [`ResourcePool::discard`] it when it turned
/// out to be broken. Dropping it without either loses the resource and the
/// capacity it occupied.
pub struct Pooled<R> {
    resource: Arc<R>,
    owner: Owner,
    created_at: Instant,
}

impl<R> Pooled<R> {
    pub(crate) fn new(resource: Arc<R>, owner: Owner, created_at: Instant) -> Self {
        Self {
            resource,
            owner,
            created_at,
        }
    }

    pub(crate) fn into_parts(self) -> (Arc<R>, Owner, Instant) {
        (self.resource, self.owner, self.created_at)
    }

    /// The pool owner this resource was created under
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Time since the resource was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether two leases refer to the same underlying resource
    pub fn same_resource(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }
}

impl<R> Deref for Pooled<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.resource
    }
}

impl<R> fmt::Debug for Pooled<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("owner", &self.owner)
            .field("age", &self.age())
            .finish_non_exhaustive()
    }
}

/// A resource borrowed from the pool
///
/// When dropped, the resource is automatically released back to the pool.
pub struct PooledResource<'a, F: ResourceFactory> {
    lease: Option<Pooled<F::Resource>>,
    pool: &'a ResourcePool<F>,
}

impl<'a, F: ResourceFactory> PooledResource<'a, F> {
    pub(crate) fn new(lease: Pooled<F::Resource>, pool: &'a ResourcePool<F>) -> Self {
        Self {
            lease: Some(lease),
            pool,
        }
    }

    /// Close the resource and give its slot back instead of returning it
    pub fn discard(mut self) {
        if let Some(lease) = self.lease.take() {
            self.pool.discard(lease);
        }
    }

    /// Detach from automatic release
    pub fn into_inner(mut self) -> Pooled<F::Resource> {
        self.lease.take().expect("resource taken")
    }

    /// Get the underlying lease
    pub fn lease(&self) -> &Pooled<F::Resource> {
        self.lease.as_ref().expect("resource taken")
    }
}

impl<'a, F: ResourceFactory> Deref for PooledResource<'a, F> {
    type Target = F::Resource;

    fn deref(&self) -> &Self::Target {
        self.lease()
    }
}

impl<'a, F: ResourceFactory> Drop for PooledResource<'a, F> {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            self.pool.release(lease);
        }
    }
}
