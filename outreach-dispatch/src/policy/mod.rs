//! Retry policy for dispatch operations.
//!
//! The policy is a value object: it classifies a failure and computes
//! a backoff decision, but never sleeps or schedules anything itself.
//! The dispatcher honors a `Retry` decision by re-queueing the target
//! with a scheduled release time.

pub mod retry;

pub use retry::{RetryDecision, RetryPolicy, TerminalReason};
