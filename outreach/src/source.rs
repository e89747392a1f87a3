//! Target source backed by a RON file

use std::path::PathBuf;

use async_trait::async_trait;
use outreach_common::{
    CampaignId, Target,
    traits::{SourceError, TargetSource},
    tracing,
};

/// Loads a campaign's targets from a RON file containing a target
/// list.
///
/// The file is re-read on every load, so edits between runs take
/// effect without a restart. Target ids in the file must be stable:
/// deduplication and resume key on them.
#[derive(Debug)]
pub struct RonFileSource {
    path: PathBuf,
}

impl RonFileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TargetSource for RonFileSource {
    async fn load(&self, campaign: &CampaignId) -> Result<Vec<Target>, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|err| {
                SourceError::Unavailable(format!("{}: {err}", self.path.display()))
            })?;

        let targets: Vec<Target> = ron::from_str(&raw)
            .map_err(|err| SourceError::Malformed(format!("{}: {err}", self.path.display())))?;

        tracing::debug!(
            campaign = %campaign,
            path = %self.path.display(),
            targets = targets.len(),
            "Loaded targets"
        );
        Ok(targets)
    }
}
