//! Campaign-level identifiers, attempt records, and aggregate state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{identity::IdentityId, target::TargetId};

/// Identifier for a campaign.
///
/// The campaign id is the deduplication namespace: the same target may
/// be processed independently by distinct campaigns, but never twice
/// within one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(String);

impl CampaignId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CampaignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CampaignId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier for one execution of a campaign.
///
/// ULIDs are lexicographically sortable by creation time, which keeps
/// attempt logs and snapshots naturally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(ulid::Ulid);

impl RunId {
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new())
    }

    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    /// Attempt started but not yet resolved.
    Pending,
    /// Transport confirmed the send.
    Success,
    /// Transient failure, eligible for backoff-and-retry.
    RetryableFailure,
    /// Failure that will not be retried within this campaign.
    TerminalFailure,
}

/// One delivery attempt for one target.
///
/// Immutable once written; appended to the run's attempt log for
/// reporting and debugging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub target_id: TargetId,
    /// 1-indexed attempt number for this target.
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
    /// The identity whose quota this attempt consumed, if any.
    pub identity_id: Option<IdentityId>,
}

impl AttemptRecord {
    /// Start a new pending attempt record.
    #[must_use]
    pub fn begin(target_id: TargetId, attempt_number: u32, identity_id: Option<IdentityId>) -> Self {
        Self {
            target_id,
            attempt_number,
            started_at: Utc::now(),
            outcome: AttemptOutcome::Pending,
            error: None,
            identity_id,
        }
    }

    /// Resolve this attempt with an outcome and optional error text.
    #[must_use]
    pub fn resolved(mut self, outcome: AttemptOutcome, error: Option<String>) -> Self {
        self.outcome = outcome;
        self.error = error;
        self
    }
}

/// Aggregate state for one campaign run.
///
/// Written only by the dispatcher's single stats-aggregation task;
/// workers emit events rather than touching these counters directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignState {
    pub campaign_id: CampaignId,
    pub run_id: RunId,

    pub total_targets: u64,
    /// Targets whose transport attempt succeeded.
    pub completed: u64,
    /// Targets that reached a terminal failure.
    pub failed: u64,
    /// Targets skipped because a previous run already resolved them.
    pub skipped: u64,
    /// Targets deferred because the identity pool was exhausted.
    pub deferred: u64,
    /// Targets currently being processed by a worker.
    pub in_flight: u64,
    /// Targets waiting in the queue (including scheduled retries).
    pub queued: u64,

    /// Terminal-failure counts grouped by error taxonomy category.
    #[serde(default)]
    pub by_category: ahash::AHashMap<String, u64>,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CampaignState {
    #[must_use]
    pub fn new(campaign_id: CampaignId, total_targets: u64) -> Self {
        Self {
            campaign_id,
            run_id: RunId::generate(),
            total_targets,
            completed: 0,
            failed: 0,
            skipped: 0,
            deferred: 0,
            in_flight: 0,
            queued: total_targets,
            by_category: ahash::AHashMap::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Targets that have reached some final disposition this run.
    #[must_use]
    pub const fn resolved(&self) -> u64 {
        self.completed + self.failed + self.skipped + self.deferred
    }

    /// Whether every target has been resolved.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.resolved() >= self.total_targets
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_attempt_record_resolution() {
        let record = AttemptRecord::begin(TargetId::new("t-1"), 1, Some(IdentityId::new("s-1")));
        assert_eq!(record.outcome, AttemptOutcome::Pending);

        let record = record.resolved(
            AttemptOutcome::RetryableFailure,
            Some("connection timed out".to_string()),
        );
        assert_eq!(record.outcome, AttemptOutcome::RetryableFailure);
        assert_eq!(record.error.as_deref(), Some("connection timed out"));
        assert_eq!(record.attempt_number, 1);
    }

    #[test]
    fn test_campaign_state_resolution_counts() {
        let mut state = CampaignState::new(CampaignId::new("spring-launch"), 10);
        assert!(!state.is_finished());

        state.completed = 3;
        state.failed = 3;
        state.deferred = 4;
        assert_eq!(state.resolved(), 10);
        assert!(state.is_finished());
    }

    #[test]
    fn test_run_ids_sort_by_creation() {
        // Ordering within one millisecond is random, so force the
        // timestamp component to advance before comparing.
        let first = RunId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = RunId::generate();

        assert!(first.ulid().timestamp_ms() < second.ulid().timestamp_ms());
        assert!(first < second);
    }
}
