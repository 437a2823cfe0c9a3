//! Resource factory abstraction

use std::sync::Arc;

use futile_core::{ConnectParams, Resource, Result};

/// Factory trait for creating and tearing down pooled resources
pub trait ResourceFactory: Send + Sync + 'static {
    /// The resource type this factory produces
    type Resource: Resource + 'static;

    /// Create one live resource from the parameter bundle
    fn create(&self, params: &ConnectParams) -> Result<Self::Resource>;

    /// Tear down a resource
    ///
    /// Best-effort: the pool logs and ignores any error returned here.
    /// Default implementation calls [`Resource::close`].
    fn close(&self, resource: &Self::Resource) -> Result<()> {
        resource.close()
    }

    /// Check that an idle resource is still usable
    ///
    /// Only consulted when `test_on_checkout` is enabled.
    /// Default implementation returns true unless the resource reports itself closed.
    fn is_valid(&self, resource: &Self::Resource) -> bool {
        !resource.is_closed()
    }
}

impl<T: ResourceFactory> ResourceFactory for Arc<T> {
    type Resource = T::Resource;

    fn create(&self, params: &ConnectParams) -> Result<Self::Resource> {
        (**self).create(params)
    }

    fn close(&self, resource: &Self::Resource) -> Result<()> {
        (**self).close(resource)
    }

    fn is_valid(&self, resource: &Self::Resource) -> bool {
        (**self).is_valid(resource)
    }
}

/// Adapts a pair of closures into a [`ResourceFactory`]
///
/// ```ignore
/// let factory = FnFactory::new(
///     |params| MysqlConnection::open(params),
///     |conn| conn.close(),
/// );
/// ```
pub struct FnFactory<C, D> {
    create: C,
    close: D,
}

impl<C, D> FnFactory<C, D> {
    pub fn new(create: C, close: D) -> Self {
        Self { create, close }
    }
}

impl<R, C, D> ResourceFactory for FnFactory<C, D>
where
    R: Resource + 'static,
    C: Fn(&ConnectParams) -> Result<R> + Send + Sync + 'static,
    D: Fn(&R) -> Result<()> + Send + Sync + 'static,
{
    type Resource = R;

    fn create(&self, params: &ConnectParams) -> Result<R> {
        (self.create)(params)
    }

    fn close(&self, resource: &R) -> Result<()> {
        (self.close)(resource)
    }
}
