//! Sender identities: the rotating credentials used to perform sends

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier for a sender identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One outbound sender identity, subject to a daily send quota.
///
/// Owned exclusively by the quota pool; all mutation happens under the
/// pool's internal lock. The invariant `sent_today <= daily_quota`
/// holds at all times, and `sent_today` resets to zero when the
/// calendar day (in the pool's configured time zone) rolls over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub id: IdentityId,

    /// Maximum sends this identity may perform per calendar day.
    pub daily_quota: u32,

    /// Sends consumed so far on `quota_day`.
    #[serde(default)]
    pub sent_today: u32,

    /// When this identity last performed (reserved) a send.
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,

    /// The calendar day `sent_today` refers to.
    #[serde(default)]
    pub quota_day: Option<NaiveDate>,
}

impl SenderIdentity {
    #[must_use]
    pub fn new(id: impl Into<IdentityId>, daily_quota: u32) -> Self {
        Self {
            id: id.into(),
            daily_quota,
            sent_today: 0,
            last_used_at: None,
            quota_day: None,
        }
    }

    /// Whether this identity still has budget for `day`.
    #[must_use]
    pub fn has_remaining(&self, day: NaiveDate) -> bool {
        self.quota_day != Some(day) || self.sent_today < self.daily_quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_remaining_resets_across_days() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let next_day = day.succ_opt().unwrap();

        let mut identity = SenderIdentity::new("sender-a", 2);
        assert!(identity.has_remaining(day));

        identity.quota_day = Some(day);
        identity.sent_today = 2;
        assert!(!identity.has_remaining(day));

        // A new day means the stale counter no longer applies.
        assert!(identity.has_remaining(next_day));
    }
}
