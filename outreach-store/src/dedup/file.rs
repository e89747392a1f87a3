use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use dashmap::DashMap;
use outreach_common::{CampaignId, TargetId, tracing};
use tokio::io::AsyncWriteExt;

use crate::{
    StoreError,
    dedup::DedupStore,
    types::{DedupEntry, FinalStatus},
};

/// File-backed dedup store.
///
/// Each campaign namespace is one append-only log file of
/// length-prefixed bincode `DedupEntry` frames, with an in-memory
/// index rebuilt lazily on first access. Appending before indexing
/// means an acknowledged `mark_done` is always durable; a torn final
/// frame from a crash mid-append is detected and dropped on reload.
#[derive(Debug)]
pub struct FileDedupStore {
    root: PathBuf,
    index: DashMap<CampaignId, Arc<DashMap<TargetId, FinalStatus>>>,
    /// Serializes file appends and rewrites.
    write_lock: tokio::sync::Mutex<()>,
}

impl FileDedupStore {
    /// Open (creating if necessary) a dedup store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> crate::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            index: DashMap::new(),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Resolve the log file path for a campaign namespace.
    ///
    /// Rejects campaign ids containing path separators or traversal
    /// patterns so an id can never escape the store root.
    fn campaign_path(&self, campaign: &CampaignId) -> crate::Result<PathBuf> {
        let id = campaign.as_str();
        if id.is_empty() || id.contains('/') || id.contains('\\') || id.contains("..") {
            return Err(StoreError::InvalidNamespace(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.dedup.bin")))
    }

    async fn load_campaign(
        &self,
        campaign: &CampaignId,
    ) -> crate::Result<Arc<DashMap<TargetId, FinalStatus>>> {
        if let Some(loaded) = self.index.get(campaign) {
            return Ok(Arc::clone(loaded.value()));
        }

        let path = self.campaign_path(campaign)?;
        let map = Arc::new(DashMap::new());

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                for entry in decode_frames(&bytes, campaign) {
                    map.insert(entry.target_id, entry.status);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        // Two tasks may race the initial load; keep whichever index
        // landed first so both see the same map.
        let entry = self
            .index
            .entry(campaign.clone())
            .or_insert_with(|| Arc::clone(&map));
        Ok(Arc::clone(entry.value()))
    }

    async fn append(&self, campaign: &CampaignId, entry: &DedupEntry) -> crate::Result<()> {
        let path = self.campaign_path(campaign)?;
        let frame = encode_frame(entry)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&frame).await?;
        file.flush().await?;
        Ok(())
    }

    /// Rewrite a campaign log from its current index (compaction after
    /// a reset).
    async fn rewrite(
        &self,
        campaign: &CampaignId,
        map: &DashMap<TargetId, FinalStatus>,
    ) -> crate::Result<()> {
        let path = self.campaign_path(campaign)?;
        let tmp = path.with_extension("bin.tmp");

        let mut buffer = Vec::new();
        for entry in map.iter() {
            buffer.extend_from_slice(&encode_frame(&DedupEntry {
                target_id: entry.key().clone(),
                status: *entry.value(),
            })?);
        }

        tokio::fs::write(&tmp, &buffer).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn encode_frame(entry: &DedupEntry) -> crate::Result<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(entry, bincode::config::standard())?;
    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::Internal("dedup record exceeds frame size".to_string()))?;

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn decode_frames(mut bytes: &[u8], campaign: &CampaignId) -> Vec<DedupEntry> {
    let mut entries = Vec::new();

    while bytes.len() >= 4 {
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&bytes[..4]);
        let len = u32::from_le_bytes(len_bytes) as usize;

        let Some(payload) = bytes.get(4..4 + len) else {
            // Torn frame from a crash mid-append; everything before it
            // is intact.
            tracing::warn!(
                campaign = %campaign,
                remaining = bytes.len(),
                "Dropping torn trailing frame in dedup log"
            );
            break;
        };

        match bincode::serde::decode_from_slice::<DedupEntry, _>(
            payload,
            bincode::config::standard(),
        ) {
            Ok((entry, _)) => entries.push(entry),
            Err(e) => {
                tracing::warn!(
                    campaign = %campaign,
                    error = %e,
                    "Dropping undecodable frame in dedup log"
                );
                break;
            }
        }

        bytes = &bytes[4 + len..];
    }

    entries
}

#[async_trait]
impl DedupStore for FileDedupStore {
    async fn is_done(
        &self,
        campaign: &CampaignId,
        target: &TargetId,
    ) -> crate::Result<Option<FinalStatus>> {
        let map = self.load_campaign(campaign).await?;
        Ok(map.get(target).map(|entry| *entry.value()))
    }

    async fn mark_done(
        &self,
        campaign: &CampaignId,
        target: &TargetId,
        status: FinalStatus,
    ) -> crate::Result<()> {
        let map = self.load_campaign(campaign).await?;
        let _guard = self.write_lock.lock().await;

        if let Some(existing) = map.get(target) {
            if *existing.value() != status {
                tracing::warn!(
                    campaign = %campaign,
                    target = %target,
                    existing = %existing.value(),
                    attempted = %status,
                    "Conflicting terminal status write ignored, first write wins"
                );
            }
            return Ok(());
        }

        // Durable before visible: append to the log, then index.
        self.append(
            campaign,
            &DedupEntry {
                target_id: target.clone(),
                status,
            },
        )
        .await?;
        map.insert(target.clone(), status);
        Ok(())
    }

    async fn entries(&self, campaign: &CampaignId) -> crate::Result<Vec<DedupEntry>> {
        let map = self.load_campaign(campaign).await?;
        Ok(map
            .iter()
            .map(|entry| DedupEntry {
                target_id: entry.key().clone(),
                status: *entry.value(),
            })
            .collect())
    }

    async fn reset(&self, campaign: &CampaignId, target: &TargetId) -> crate::Result<()> {
        let map = self.load_campaign(campaign).await?;
        let _guard = self.write_lock.lock().await;

        if map.remove(target).is_some() {
            self.rewrite(campaign, &map).await?;
        }
        Ok(())
    }
}
