//! Progress snapshots for campaign resumability
//!
//! The dispatcher's stats aggregator periodically hands a consistent
//! copy of `CampaignState` to the progress store; on restart the
//! operator surface loads the last snapshot to report where a run got
//! to. Snapshots are advisory: resume correctness derives from the
//! dedup store's terminal entries, not from the snapshot.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use outreach_common::{CampaignId, CampaignState};

pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;

/// Durable (or test-transient) storage for campaign snapshots.
#[async_trait]
pub trait ProgressStore: Send + Sync + std::fmt::Debug {
    /// Persist a snapshot, replacing any previous one for the campaign.
    async fn snapshot(&self, state: &CampaignState) -> crate::Result<()>;

    /// Load the most recent snapshot for a campaign, if any.
    async fn load(&self, campaign: &CampaignId) -> crate::Result<Option<CampaignState>>;
}
