//! Discard-and-retry helpers layered on top of the pool
//!
//! The pool never retries work itself. These helpers implement the usual
//! caller pattern: acquire a resource, run one unit of work, and when it fails
//! in a way that points at a dead connection, discard that resource and try
//! again on a fresh one.
//!
//! # Example
//!
//! ```ignore
//! use futile_pool::retry::{BackoffStrategy, RetryConfig};
//!
//! let rows = pool.run(|conn| conn.execute("SELECT 1"))?;
//!
//! let patient = RetryConfig::new(3, BackoffStrategy::new(50, 1_000));
//! let rows = pool.run_with(&patient, |conn| conn.execute("SELECT 1"))?;
//! ```

mod backoff;
mod runner;


pub use backoff::BackoffStrategy;
pub use runner::RetryConfig;
