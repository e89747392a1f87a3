//! Deduplication store: which targets have already been resolved
//!
//! Keyed by `(campaign id, target id)` so the same target can be
//! processed independently across distinct campaigns. `mark_done` is
//! idempotent because retries and process restarts can both attempt
//! the write.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use outreach_common::{CampaignId, TargetId};

use crate::types::{DedupEntry, FinalStatus};

pub use file::FileDedupStore;
pub use memory::MemoryDedupStore;

/// Tracks terminally-resolved targets, persisted so reruns skip them.
#[async_trait]
pub trait DedupStore: Send + Sync + std::fmt::Debug {
    /// Look up the final status recorded for a target, if any.
    async fn is_done(
        &self,
        campaign: &CampaignId,
        target: &TargetId,
    ) -> crate::Result<Option<FinalStatus>>;

    /// Record a terminal status for a target.
    ///
    /// Idempotent: writing the same terminal status twice is a no-op.
    /// A conflicting terminal status is also a no-op (the first write
    /// wins) and is logged at warn, since it indicates either a
    /// duplicate target id or a logic error upstream.
    async fn mark_done(
        &self,
        campaign: &CampaignId,
        target: &TargetId,
        status: FinalStatus,
    ) -> crate::Result<()>;

    /// All recorded entries for a campaign, for resume and reporting.
    async fn entries(&self, campaign: &CampaignId) -> crate::Result<Vec<DedupEntry>>;

    /// Explicitly remove a target's terminal status so it becomes
    /// eligible for reprocessing.
    async fn reset(&self, campaign: &CampaignId, target: &TargetId) -> crate::Result<()>;
}
