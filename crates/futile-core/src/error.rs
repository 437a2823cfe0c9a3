//! Error types for futile

use std::time::Duration;

use thiserror::Error;

/// Core error type for futile operations
#[derive(Error, Debug)]
pub enum FutileError {
    #[error("Pool exhausted: no resource available within {timeout:?} (max_size: {max_size})")]
    PoolExhausted { max_size: usize, timeout: Duration },

    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl FutileError {
    /// Whether the error signals a broken or stale connection.
    ///
    /// These are the failures a caller recovers from by discarding the
    /// resource and retrying on a freshly acquired one.
    pub fn is_stale_connection(&self) -> bool {
        matches!(
            self,
            FutileError::Connection(_) | FutileError::Io(_) | FutileError::Timeout(_)
        )
    }

    /// Whether the pool ran out of capacity before the acquire deadline.
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, FutileError::PoolExhausted { .. })
    }
}

/// Result type alias for futile operations
pub type Result<T> = std::result::Result<T, FutileError>;
