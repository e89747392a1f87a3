use std::path::PathBuf;

use async_trait::async_trait;
use outreach_common::{CampaignId, CampaignState};

use crate::{StoreError, progress::ProgressStore};

/// File-backed progress store.
///
/// One bincode snapshot file per campaign, written via a temporary
/// file and an atomic rename so a crash mid-write can never leave a
/// half-written snapshot behind.
#[derive(Debug)]
pub struct FileProgressStore {
    root: PathBuf,
}

impl FileProgressStore {
    /// Open (creating if necessary) a progress store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> crate::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn campaign_path(&self, campaign: &CampaignId) -> crate::Result<PathBuf> {
        let id = campaign.as_str();
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(StoreError::InvalidNamespace(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.progress.bin")))
    }
}

#[async_trait]
impl ProgressStore for FileProgressStore {
    async fn snapshot(&self, state: &CampaignState) -> crate::Result<()> {
        let path = self.campaign_path(&state.campaign_id)?;
        let tmp = path.with_extension("bin.tmp");

        let bytes = bincode::serde::encode_to_vec(state, bincode::config::standard())?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn load(&self, campaign: &CampaignId) -> crate::Result<Option<CampaignState>> {
        let path = self.campaign_path(campaign)?;

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let (state, _) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(Some(state))
    }
}
