//! Persisted record types

use outreach_common::TargetId;
use serde::{Deserialize, Serialize};

/// Final disposition of a target within a campaign namespace.
///
/// Once a target carries any of these, it is never reprocessed within
/// the same campaign unless explicitly reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinalStatus {
    /// Delivery succeeded.
    Done,
    /// Delivery reached a terminal failure.
    Failed,
    /// The target was skipped (already resolved, or operator-excluded).
    Skipped,
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// One persisted dedup record: `target id → final status` within a
/// campaign namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupEntry {
    pub target_id: TargetId,
    pub status: FinalStatus,
}
