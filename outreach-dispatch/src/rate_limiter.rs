//! Campaign-wide rate limiting over a sliding window
//!
//! One limiter is shared by all workers and bounds total operations
//! per unit time. Admissions are checked against a log of recent grant
//! times rather than a refilling counter: a token bucket that starts
//! full and refills continuously lets an initial burst plus a window's
//! worth of refill through, roughly doubling the intended rate in the
//! first window. The grant log enforces the bound directly: no rolling
//! window of the configured duration ever contains more than
//! `capacity` grants.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Configuration for rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum operations within one sliding window.
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Sliding window duration in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            window_secs: default_window_secs(),
        }
    }
}

const fn default_capacity() -> u32 {
    10
}

const fn default_window_secs() -> f64 {
    1.0
}

/// Shared sliding-window rate limiter.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    /// Admission times of grants still inside the window, oldest
    /// first. Pruned on every admission check.
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        let window_secs = if config.window_secs > 0.0 {
            config.window_secs
        } else {
            1.0
        };

        Self {
            capacity: usize::try_from(config.capacity.max(1)).unwrap_or(usize::MAX),
            window: Duration::from_secs_f64(window_secs),
            grants: Mutex::new(VecDeque::new()),
        }
    }

    fn prune(grants: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = grants.front() {
            if now.duration_since(*oldest) >= window {
                grants.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit `cost` grants now, or report how long until enough of the
    /// oldest grants age out of the window.
    fn try_admit(&self, cost: usize) -> Result<(), Duration> {
        let now = Instant::now();
        let mut grants = self.grants.lock();
        Self::prune(&mut grants, now, self.window);

        if grants.len() + cost <= self.capacity {
            for _ in 0..cost {
                grants.push_back(now);
            }
            return Ok(());
        }

        // The (len + cost - capacity)-th oldest grant must leave the
        // window before `cost` slots open up.
        let blocking = grants[grants.len() + cost - self.capacity - 1];
        Err((blocking + self.window).saturating_duration_since(now))
    }

    /// Suspend the caller until `cost` grants have been admitted.
    ///
    /// Safe for arbitrary concurrent callers. Acquisition order is not
    /// FIFO; the correctness property is only that no rolling window
    /// of the configured duration grants more than `capacity` tokens.
    /// `cost` must not exceed the configured capacity.
    pub async fn acquire(&self, cost: u32) {
        let cost = usize::try_from(cost).unwrap_or(self.capacity);
        debug_assert!(cost <= self.capacity);
        let cost = cost.clamp(1, self.capacity);

        loop {
            match self.try_admit(cost) {
                Ok(()) => return,
                // Sleep the computed shortfall, then re-contend;
                // another caller may have taken the slots in the
                // meantime.
                Err(wait) => tokio::time::sleep(wait.max(Duration::from_millis(1))).await,
            }
        }
    }

    /// Try to admit `cost` grants without waiting.
    pub fn try_acquire(&self, cost: u32) -> bool {
        let cost = usize::try_from(cost).unwrap_or(self.capacity);
        self.try_admit(cost.clamp(1, self.capacity)).is_ok()
    }
}
