//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Statistics about a resource pool's current state
///
/// `idle + active + vacant` never exceeds `max_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Configured capacity
    max_size: usize,
    /// Created resources waiting in the free list
    idle: usize,
    /// Resources currently lent out (or being created)
    active: usize,
    /// Free slots no resource has been created for yet
    vacant: usize,
    /// Callers blocked in acquire
    waiting: usize,
    /// Resources created since the pool was built
    created: u64,
    /// Factory calls that failed
    creation_failures: u64,
    /// Acquires that ran out of time
    timeouts: u64,
    /// Fork or invalidation resets
    resets: u64,
}

impl PoolStats {
    /// Create a snapshot of pool occupancy with zeroed counters
    pub fn new(max_size: usize, idle: usize, active: usize, vacant: usize, waiting: usize) -> Self {
        Self {
            max_size,
            idle,
            active,
            vacant,
            waiting,
            created: 0,
            creation_failures: 0,
            timeouts: 0,
            resets: 0,
        }
    }

    pub(crate) fn with_counters(
        mut self,
        created: u64,
        creation_failures: u64,
        timeouts: u64,
        resets: u64,
    ) -> Self {
        self.created = created;
        self.creation_failures = creation_failures;
        self.timeouts = timeouts;
        self.resets = resets;
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of live resources (idle + active)
    pub fn total(&self) -> usize {
        self.idle + self.active
    }

    pub fn idle(&self) -> usize {
        self.idle
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn vacant(&self) -> usize {
        self.vacant
    }

    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn creation_failures(&self) -> u64 {
        self.creation_failures
    }

    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Share of capacity currently lent out (0.0 to 1.0)
    ///
    /// Returns 0.0 if max_size is 0 to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.active as f64 / self.max_size as f64
        }
    }

    /// Check if an acquire would have to wait right now
    pub fn is_full(&self) -> bool {
        self.idle == 0 && self.vacant == 0
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new(0, 0, 0, 0, 0)
    }
}
