use async_trait::async_trait;
use thiserror::Error;

use crate::{campaign::CampaignId, target::Target};

/// Errors raised while loading targets.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing data could not be read at all.
    #[error("Failed to read target data: {0}")]
    Unavailable(String),

    /// The backing data was read but could not be understood.
    #[error("Malformed target data: {0}")]
    Malformed(String),
}

/// Yields the targets for a campaign.
///
/// Loads must be finite and restartable: re-calling `load` for a
/// resumed campaign must yield the same set and order of targets, or
/// the dispatcher's resume logic breaks. Target ids must be stable
/// across loads for the same reason.
#[async_trait]
pub trait TargetSource: Send + Sync {
    async fn load(&self, campaign: &CampaignId) -> Result<Vec<Target>, SourceError>;
}
