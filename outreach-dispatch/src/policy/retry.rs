use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// Why a failure was classified terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    /// The error itself is permanent (rejection, unusable target).
    Classified,
    /// A retryable error ran out of attempts and was converted to
    /// terminal.
    Exhausted,
}

/// Decision for one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Record the target as failed; never retry.
    Terminal(TerminalReason),
    /// Re-queue the target with a release time `delay` from now.
    Retry { delay: Duration },
}

/// Retry policy configuration.
///
/// Backoff is exponential with jitter:
/// `delay = base * 2^(attempt - 1) * (0.5 + r/2)` with `r` uniform in
/// `[0, 1)`, capped at `max_delay_ms`. After exactly `max_attempts`
/// retryable failures the error converts to terminal; nothing is
/// retried forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of delivery attempts per target before a
    /// retryable failure is converted to terminal.
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (milliseconds).
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Cap on the computed backoff delay (milliseconds).
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the failure of attempt `attempt` (1-indexed).
    ///
    /// Terminal errors stay terminal. Retryable errors get a backoff
    /// delay until `max_attempts` attempts have been made, after which
    /// they are converted to `Terminal(Exhausted)`.
    #[must_use]
    pub fn classify(&self, error: &DispatchError, attempt: u32) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Terminal(TerminalReason::Classified);
        }

        if attempt >= self.max_attempts {
            return RetryDecision::Terminal(TerminalReason::Exhausted);
        }

        RetryDecision::Retry {
            delay: self.backoff_delay(attempt),
        }
    }

    /// Backoff delay after the `attempt`-th failure (1-indexed).
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_delay_with(attempt, rand::rng().random::<f64>())
    }

    /// Deterministic core of the backoff calculation; `r` is the
    /// jitter sample in `[0, 1)`.
    fn backoff_delay_with(&self, attempt: u32, r: f64) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let unjittered = if exponent >= 63 {
            self.max_delay_ms
        } else {
            self.base_delay_ms
                .saturating_mul(1u64 << exponent)
                .min(self.max_delay_ms)
        };

        // Jitter multiplier in [0.5, 1.0): spreads simultaneous
        // retries without ever exceeding the exponential envelope.
        #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let jittered = ((unjittered as f64) * 0.5f64.mul_add(r, 0.5)).max(0.0) as u64;

        Duration::from_millis(jittered.min(self.max_delay_ms))
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        5
    }

    pub const fn base_delay_ms() -> u64 {
        1000 // 1 second
    }

    pub const fn max_delay_ms() -> u64 {
        300_000 // 5 minutes
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use outreach_common::traits::TransportError;

    use super::*;
    use crate::error::{TerminalError, TransientError};

    fn transient() -> DispatchError {
        DispatchError::Transient(TransientError::Transport("timed out".to_string()))
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 300_000);
    }

    #[test]
    fn test_terminal_error_is_never_retried() {
        let policy = RetryPolicy::default();
        let error = DispatchError::Terminal(TerminalError::Rejected("hard bounce".to_string()));

        assert_eq!(
            policy.classify(&error, 1),
            RetryDecision::Terminal(TerminalReason::Classified)
        );
    }

    #[test]
    fn test_retryable_error_exhausts_after_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        let error = transient();

        assert!(matches!(
            policy.classify(&error, 1),
            RetryDecision::Retry { .. }
        ));
        assert!(matches!(
            policy.classify(&error, 2),
            RetryDecision::Retry { .. }
        ));
        // The third attempt has been made; the error converts to
        // terminal rather than retrying forever.
        assert_eq!(
            policy.classify(&error, 3),
            RetryDecision::Terminal(TerminalReason::Exhausted)
        );
        assert_eq!(
            policy.classify(&error, 4),
            RetryDecision::Terminal(TerminalReason::Exhausted)
        );
    }

    #[test]
    fn test_pushback_is_retryable() {
        let policy = RetryPolicy::default();
        let error: DispatchError = TransportError::Pushback("429".to_string()).into();
        assert!(matches!(
            policy.classify(&error, 1),
            RetryDecision::Retry { .. }
        ));
    }

    #[test]
    fn test_backoff_doubles_without_jitter() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 60_000,
        };

        // r = 1.0 would give the full envelope; feed the top of the
        // jitter range to check the doubling shape.
        let d1 = policy.backoff_delay_with(1, 1.0);
        let d2 = policy.backoff_delay_with(2, 1.0);
        let d3 = policy.backoff_delay_with(3, 1.0);

        assert_eq!(d1, Duration::from_millis(100));
        assert_eq!(d2, Duration::from_millis(200));
        assert_eq!(d3, Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 64,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
        };

        assert_eq!(policy.backoff_delay_with(20, 1.0), Duration::from_millis(5000));
        assert_eq!(policy.backoff_delay_with(63, 1.0), Duration::from_millis(5000));
        // Exponent overflow guard path.
        assert_eq!(policy.backoff_delay_with(70, 1.0), Duration::from_millis(5000));
    }

    #[test]
    fn test_jitter_stays_within_envelope() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        };

        for _ in 0..100 {
            let delay = policy.backoff_delay(2).as_millis();
            // base * 2 = 2000ms envelope, jitter in [0.5, 1.0).
            assert!((1000..2000).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_jitterless_delays_are_non_decreasing() {
        let policy = RetryPolicy {
            max_attempts: 16,
            base_delay_ms: 50,
            max_delay_ms: 10_000,
        };

        let mut last = Duration::ZERO;
        for attempt in 1..=16 {
            let delay = policy.backoff_delay_with(attempt, 1.0);
            assert!(delay >= last);
            last = delay;
        }
    }
}
