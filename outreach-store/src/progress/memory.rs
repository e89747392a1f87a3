use async_trait::async_trait;
use outreach_common::{CampaignId, CampaignState};
use parking_lot::Mutex;

use crate::progress::ProgressStore;

/// In-memory progress store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    snapshots: Mutex<ahash::AHashMap<CampaignId, CampaignState>>,
}

impl MemoryProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn snapshot(&self, state: &CampaignState) -> crate::Result<()> {
        self.snapshots
            .lock()
            .insert(state.campaign_id.clone(), state.clone());
        Ok(())
    }

    async fn load(&self, campaign: &CampaignId) -> crate::Result<Option<CampaignState>> {
        Ok(self.snapshots.lock().get(campaign).cloned())
    }
}
