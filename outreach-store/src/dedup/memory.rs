use async_trait::async_trait;
use dashmap::DashMap;
use outreach_common::{CampaignId, TargetId, tracing};

use crate::{
    dedup::DedupStore,
    types::{DedupEntry, FinalStatus},
};

/// In-memory dedup store.
///
/// Primarily intended for testing and single-run campaigns; state does
/// not survive a process restart. Concurrent access is lock-free via
/// `DashMap`.
#[derive(Debug, Default, Clone)]
pub struct MemoryDedupStore {
    entries: DashMap<(CampaignId, TargetId), FinalStatus>,
}

impl MemoryDedupStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded entries across all campaigns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn is_done(
        &self,
        campaign: &CampaignId,
        target: &TargetId,
    ) -> crate::Result<Option<FinalStatus>> {
        Ok(self
            .entries
            .get(&(campaign.clone(), target.clone()))
            .map(|entry| *entry.value()))
    }

    async fn mark_done(
        &self,
        campaign: &CampaignId,
        target: &TargetId,
        status: FinalStatus,
    ) -> crate::Result<()> {
        use dashmap::mapref::entry::Entry;

        let key = (campaign.clone(), target.clone());
        match self.entries.entry(key) {
            Entry::Occupied(existing) => {
                if *existing.get() != status {
                    tracing::warn!(
                        campaign = %campaign,
                        target = %target,
                        existing = %existing.get(),
                        attempted = %status,
                        "Conflicting terminal status write ignored, first write wins"
                    );
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(status);
            }
        }
        Ok(())
    }

    async fn entries(&self, campaign: &CampaignId) -> crate::Result<Vec<DedupEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| &entry.key().0 == campaign)
            .map(|entry| DedupEntry {
                target_id: entry.key().1.clone(),
                status: *entry.value(),
            })
            .collect())
    }

    async fn reset(&self, campaign: &CampaignId, target: &TargetId) -> crate::Result<()> {
        self.entries.remove(&(campaign.clone(), target.clone()));
        Ok(())
    }
}
