//! Resource pooling with lazy creation and fork detection
//!
//! The pool is seeded with `max_size` vacant slots. Acquiring pops the most
//! recently released item first, so warm resources are reused before a
//! vacant slot is turned into a new resource.
//!
//! # Example
//!
//! ```ignore
//! use futile_pool::pool::{PoolConfig, ResourcePool};
//!
//! let config = PoolConfig::new(5)
//!     .with_acquire_timeout_ms(500)
//!     .with_param("host", "127.0.0.1");
//!
//! let pool = ResourcePool::new(config, factory);
//! let conn = pool.get()?;
//! conn.execute("SELECT 1")?;
//! // Resource returned to the pool on drop
//! ```

mod config;
mod factory;
mod lease;
mod owner;
#[allow(clippy::module_inception)]
mod pool;
mod stats;


pub use config::PoolConfig;
pub use factory::{FnFactory, ResourceFactory};
pub use lease::{Pooled, PooledResource};
pub use owner::{OsProcess, Owner, ProcessIdentity};
pub use pool::ResourcePool;
pub use stats::PoolStats;
