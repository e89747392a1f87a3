//! Outreach dispatch core
//!
//! Takes a campaign's targets, assigns each to one of a bounded pool
//! of concurrent workers, rotates rate-limited sender identities,
//! retries transient failures with backoff, deduplicates
//! already-resolved targets, and persists resumable progress.

pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod queue;
pub mod quota;
pub mod rate_limiter;
pub mod report;
pub mod stats;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use error::{DispatchError, TerminalError, TransientError};
pub use policy::{RetryDecision, RetryPolicy, TerminalReason};
pub use quota::{QuotaAcquire, QuotaLease, QuotaPool};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use report::{CampaignReport, FailureGroup};
pub use stats::StatsEvent;
