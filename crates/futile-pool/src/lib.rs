//! Futile Pool - Bounded pooling of expensive resources
//!
//! This crate hands out reusable resources (typically database connections)
//! to concurrent callers, creates them lazily up to a fixed maximum, and
//! discards resources inherited across a process fork instead of reusing them.

pub mod pool;
pub mod retry;

#[cfg(test)]
mod testing;

pub use pool::{
    FnFactory, OsProcess, Owner, PoolConfig, PoolStats, Pooled, PooledResource, ProcessIdentity,
    ResourceFactory, ResourcePool,
};
pub use retry::{BackoffStrategy, RetryConfig};
