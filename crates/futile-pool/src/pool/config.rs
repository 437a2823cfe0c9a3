//! Pool configuration types

use std::time::Duration;

use futile_core::{ConnectParams, FutileError, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_SIZE: usize = 50;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 20_000;

/// Configuration for a resource pool
///
/// Controls pool sizing, the acquire timeout, optional idle eviction and the
/// parameter bundle handed to the resource factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of resources that may exist at once
    max_size: usize,
    /// Timeout in milliseconds when acquiring a resource (0 = fail immediately)
    acquire_timeout_ms: u64,
    /// Idle resources older than this are closed instead of reused
    idle_timeout_ms: Option<u64>,
    /// Resources older than this are closed instead of reused
    max_lifetime_ms: Option<u64>,
    /// Ask the factory whether an idle resource is still valid before lending it
    test_on_checkout: bool,
    /// Parameters passed to the factory for every new resource
    params: ConnectParams,
}

impl PoolConfig {
    /// Create a new pool configuration with the given maximum size
    ///
    /// # Panics
    ///
    /// Panics if `max_size` is 0.
    pub fn new(max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );

        Self {
            max_size,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            idle_timeout_ms: None,
            max_lifetime_ms: None,
            test_on_checkout: false,
            params: ConnectParams::default(),
        }
    }

    /// Parse a configuration from TOML and validate it
    ///
    /// ```
    /// use futile_pool::PoolConfig;
    ///
    /// let config = PoolConfig::from_toml_str(
    ///     r#"
    ///     max_size = 4
    ///     acquire_timeout_ms = 250
    ///
    ///     [params]
    ///     host = "127.0.0.1"
    ///     "#,
    /// )
    /// .unwrap();
    /// assert_eq!(config.max_size(), 4);
    /// assert_eq!(config.params().get("host"), Some("127.0.0.1"));
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| FutileError::Configuration(format!("invalid pool config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that deserialization cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(FutileError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        if let (Some(idle), Some(lifetime)) = (self.idle_timeout_ms, self.max_lifetime_ms) {
            if idle > lifetime {
                tracing::warn!(
                    idle_timeout_ms = idle,
                    max_lifetime_ms = lifetime,
                    "idle timeout exceeds max lifetime and will never apply"
                );
            }
        }
        Ok(())
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the maximum resource lifetime in milliseconds
    pub fn with_max_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.max_lifetime_ms = Some(lifetime_ms);
        self
    }

    /// Validate idle resources through the factory before lending them
    pub fn with_test_on_checkout(mut self, enabled: bool) -> Self {
        self.test_on_checkout = enabled;
        self
    }

    /// Replace the parameter bundle
    pub fn with_params(mut self, params: ConnectParams) -> Self {
        self.params = params;
        self
    }

    /// Set a single factory parameter
    pub fn with_param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params = self.params.with_param(key, value);
        self
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the idle timeout as a Duration if set
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    /// Get the maximum lifetime as a Duration if set
    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_ms.map(Duration::from_millis)
    }

    pub fn test_on_checkout(&self) -> bool {
        self.test_on_checkout
    }

    /// Get the factory parameters
    pub fn params(&self) -> &ConnectParams {
        &self.params
    }
}

impl Default for PoolConfig {
    /// Defaults:
    /// - max_size: 50
    /// - acquire_timeout: 20 seconds
    /// - no idle timeout, no max lifetime, no checkout validation
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}
