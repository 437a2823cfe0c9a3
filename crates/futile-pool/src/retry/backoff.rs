//! Exponential delay between retry attempts

use std::time::Duration;

/// Exponential backoff strategy for retries.
///
/// ```
/// use futile_pool::retry::BackoffStrategy;
/// use std::time::Duration;
///
/// let backoff = BackoffStrategy::new(100, 1_000);
/// assert_eq!(backoff.delay_for(0), Duration::from_millis(100));
/// assert_eq!(backoff.delay_for(1), Duration::from_millis(200));
/// assert_eq!(backoff.delay_for(10), Duration::from_millis(1_000));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    initial_ms: u64,
    max_ms: u64,
    multiplier: f64,
}

impl BackoffStrategy {
    /// Delays start at `initial_ms` and never exceed `max_ms`
    pub fn new(initial_ms: u64, max_ms: u64) -> Self {
        Self {
            initial_ms,
            max_ms: max_ms.max(initial_ms),
            multiplier: 2.0,
        }
    }

    /// Retry immediately
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    /// Set the growth factor (clamped to at least 1.0)
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Delay before retry number `attempt` (0 = first retry)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_ms as f64) * self.multiplier.powi(attempt as i32);
        Duration::from_millis(delay_ms.min(self.max_ms as f64) as u64)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

impl Default for BackoffStrategy {
    /// 100ms initial, 5 seconds max, doubling
    fn default() -> Self {
        Self::new(100, 5_000)
    }
}
