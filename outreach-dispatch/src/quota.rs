//! Sender identity pool with daily quotas
//!
//! Hands out the least-recently-used identity with remaining quota so
//! sends rotate fairly across identities. Quota is consumed on acquire
//! and kept even if the send later fails: a retry storm can never make
//! an identity look like it still has budget it already reserved.
//!
//! The daily counter reset happens lazily on acquire when the calendar
//! day (in the pool's configured time zone) has rolled over; there is
//! no background timer, which keeps the pool trivial to test.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use outreach_common::{IdentityId, SenderIdentity, tracing};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Result of a quota acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaAcquire {
    /// An identity was reserved; its `sent_today` has already been
    /// incremented.
    Acquired(QuotaLease),
    /// No identity has remaining quota for the current day. The
    /// dispatcher defers the target rather than failing it.
    Exhausted,
}

/// A reservation against one identity's daily quota.
///
/// There is deliberately no release operation: a failed send still
/// consumes the reserved quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLease {
    pub identity_id: IdentityId,
}

/// Pool of interchangeable sender identities.
///
/// The identities are owned exclusively by the pool; every
/// read-modify-write runs under one mutex so concurrent acquires can
/// never oversell `daily_quota`.
#[derive(Debug)]
pub struct QuotaPool {
    identities: Mutex<Vec<SenderIdentity>>,
    /// Time zone whose midnight is the quota cutover boundary.
    offset: FixedOffset,
}

impl QuotaPool {
    /// Create a pool over `identities` with the quota day boundary at
    /// midnight in the time zone `utc_offset_minutes` east of UTC.
    #[must_use]
    pub fn new(identities: Vec<SenderIdentity>, utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self {
            identities: Mutex::new(identities),
            offset,
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    /// Reserve one send from the least-recently-used identity with
    /// remaining quota for the current day.
    pub fn acquire(&self) -> QuotaAcquire {
        self.acquire_on(self.today())
    }

    fn acquire_on(&self, day: NaiveDate) -> QuotaAcquire {
        let mut identities = self.identities.lock();

        // Lazy daily reset: stale counters roll to zero on first
        // acquire after the cutover boundary.
        for identity in identities.iter_mut() {
            if identity.quota_day != Some(day) {
                identity.quota_day = Some(day);
                identity.sent_today = 0;
            }
        }

        let Some(identity) = identities
            .iter_mut()
            .filter(|identity| identity.has_remaining(day))
            .min_by_key(|identity| identity.last_used_at)
        else {
            return QuotaAcquire::Exhausted;
        };

        identity.sent_today += 1;
        identity.last_used_at = Some(Utc::now());
        debug_assert!(identity.sent_today <= identity.daily_quota);

        tracing::debug!(
            identity = %identity.id,
            sent_today = identity.sent_today,
            daily_quota = identity.daily_quota,
            "Reserved send quota"
        );

        QuotaAcquire::Acquired(QuotaLease {
            identity_id: identity.id.clone(),
        })
    }

    /// Total remaining sends across the pool for the current day.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        let day = self.today();
        self.identities
            .lock()
            .iter()
            .map(|identity| {
                if identity.quota_day == Some(day) {
                    identity.daily_quota.saturating_sub(identity.sent_today)
                } else {
                    identity.daily_quota
                }
            })
            .sum()
    }

    /// Copy of the per-identity counters, for the status surface and
    /// the final report.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SenderIdentity> {
        self.identities.lock().clone()
    }
}
