//! Running work against pooled resources with discard-and-retry

use futile_core::{FutileError, Result};

use super::BackoffStrategy;
use crate::pool::{ResourceFactory, ResourcePool};

/// How [`ResourcePool::run_with`] reacts to failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = never retry)
    max_retries: u32,
    /// Delay between attempts
    backoff: BackoffStrategy,
    /// Also retry `Query` errors, not just connection failures
    retry_on_query_error: bool,
}

impl RetryConfig {
    pub fn new(max_retries: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_retries,
            backoff,
            retry_on_query_error: false,
        }
    }

    /// Never retry; stale resources are still discarded
    pub fn no_retry() -> Self {
        Self::new(0, BackoffStrategy::none())
    }

    /// Set whether query errors trigger a retry (default: false)
    ///
    /// Only safe for idempotent work.
    pub fn with_retry_on_query_error(mut self, retry: bool) -> Self {
        self.retry_on_query_error = retry;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }

    /// Whether `error` means the resource should be thrown away
    pub fn should_discard(&self, error: &FutileError) -> bool {
        error.is_stale_connection()
            || (self.retry_on_query_error && matches!(error, FutileError::Query(_)))
    }
}

impl Default for RetryConfig {
    /// One immediate retry
    fn default() -> Self {
        Self::new(1, BackoffStrategy::none())
    }
}

impl<F: ResourceFactory> ResourcePool<F> {
    /// Run `op` on a pooled resource, retrying once on a stale connection
    pub fn run<T, Op>(&self, op: Op) -> Result<T>
    where
        Op: FnMut(&F::Resource) -> Result<T>,
    {
        self.run_with(&RetryConfig::default(), op)
    }

    /// Run `op` on a pooled resource following `config`
    ///
    /// On success the resource goes back to the pool. A failure that points
    /// at a broken resource discards it; the work is then retried on a freshly
    /// acquired resource while retries remain. Other failures, including
    /// `PoolExhausted` and factory errors, are returned as they are.
    pub fn run_with<T, Op>(&self, config: &RetryConfig, mut op: Op) -> Result<T>
    where
        Op: FnMut(&F::Resource) -> Result<T>,
    {
        let mut attempt = 0u32;
        loop {
            let resource = self.get()?;
            let err = match op(&*resource) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !config.should_discard(&err) {
                return Err(err);
            }
            resource.discard();

            if attempt >= config.max_retries() {
                return Err(err);
            }

            let delay = config.backoff().delay_for(attempt);
            tracing::warn!(
                attempt = attempt + 1,
                max_retries = config.max_retries(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "discarded stale resource, retrying"
            );
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            attempt += 1;
        }
    }
}
