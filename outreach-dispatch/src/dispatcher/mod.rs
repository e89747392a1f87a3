//! Campaign dispatcher: intake, worker pool, and run lifecycle
//!
//! One `run` processes one campaign end to end: load targets, skip the
//! ones a previous run already resolved, then fan the rest out to a
//! bounded pool of workers. Workers share the identity quota pool, the
//! rate limiter, and the dedup store; a single aggregation task owns
//! the run's counters.
//!
//! Shutdown drains rather than kills: on `Signal::Shutdown` workers
//! stop pulling from the queue but finish the attempt they hold, the
//! aggregator writes a final snapshot, and `run` still returns a
//! report for what was processed.

mod worker;

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, AtomicU64},
    },
    time::Duration,
};

use outreach_common::{
    CampaignId, CampaignState, SenderIdentity, Signal, internal,
    traits::{ContentGenerator, TargetSource, Transport},
    tracing,
};
use outreach_store::{DedupStore, ProgressStore};
use serde::{Deserialize, Serialize};
use tokio::{sync::broadcast, sync::watch, task::JoinSet};

use crate::{
    error::DispatchError,
    policy::RetryPolicy,
    queue::{QueuedTarget, WorkQueue},
    quota::QuotaPool,
    rate_limiter::{RateLimitConfig, RateLimiter},
    report::CampaignReport,
    stats::{self, StatsEvent},
};

/// Tunables for a dispatcher instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Number of concurrent workers.
    #[serde(default = "defaults::concurrency")]
    pub concurrency: usize,

    /// Resolutions between persisted progress snapshots.
    #[serde(default = "defaults::snapshot_every")]
    pub snapshot_every: u64,

    /// Wall-clock bound on snapshot staleness (seconds).
    #[serde(default = "defaults::snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,

    /// Consecutive dedup write failures before the run drains.
    #[serde(default = "defaults::persistence_failure_threshold")]
    pub persistence_failure_threshold: u32,

    /// Delay between in-place retries of a failed dedup write
    /// (milliseconds).
    #[serde(default = "defaults::persistence_retry_delay_ms")]
    pub persistence_retry_delay_ms: u64,

    /// Minutes east of UTC for the daily quota cutover boundary.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::concurrency(),
            snapshot_every: defaults::snapshot_every(),
            snapshot_interval_secs: defaults::snapshot_interval_secs(),
            persistence_failure_threshold: defaults::persistence_failure_threshold(),
            persistence_retry_delay_ms: defaults::persistence_retry_delay_ms(),
            utc_offset_minutes: 0,
            rate_limit: RateLimitConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

mod defaults {
    pub const fn concurrency() -> usize {
        4
    }

    pub const fn snapshot_every() -> u64 {
        25
    }

    pub const fn snapshot_interval_secs() -> u64 {
        30
    }

    pub const fn persistence_failure_threshold() -> u32 {
        5
    }

    pub const fn persistence_retry_delay_ms() -> u64 {
        500
    }
}

/// Drives campaign runs against a fixed set of collaborators.
///
/// The quota pool lives on the dispatcher, not the run, so daily
/// identity budgets are shared across consecutive runs in the same
/// process.
pub struct Dispatcher {
    config: DispatcherConfig,
    quota: Arc<QuotaPool>,
    limiter: Arc<RateLimiter>,
    dedup: Arc<dyn DedupStore>,
    progress: Arc<dyn ProgressStore>,
    source: Arc<dyn TargetSource>,
    generator: Arc<dyn ContentGenerator>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        config: DispatcherConfig,
        identities: Vec<SenderIdentity>,
        source: Arc<dyn TargetSource>,
        generator: Arc<dyn ContentGenerator>,
        transport: Arc<dyn Transport>,
        dedup: Arc<dyn DedupStore>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        let quota = Arc::new(QuotaPool::new(identities, config.utc_offset_minutes));
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        Self {
            config,
            quota,
            limiter,
            dedup,
            progress,
            source,
            generator,
            transport,
        }
    }

    /// Execute one run of `campaign` to completion or drained shutdown.
    ///
    /// # Errors
    ///
    /// Fails only when the target source cannot produce the campaign's
    /// targets. Per-target failures are absorbed into the report.
    pub async fn run(
        &self,
        campaign: CampaignId,
        mut signals: broadcast::Receiver<Signal>,
    ) -> Result<CampaignReport, DispatchError> {
        let targets = self.source.load(&campaign).await?;
        let total = targets.len() as u64;

        let state = CampaignState::new(campaign.clone(), total);
        tracing::info!(
            campaign = %campaign,
            run = %state.run_id,
            targets = total,
            workers = self.config.concurrency,
            "Starting campaign run"
        );

        let stats = stats::spawn(
            state,
            Arc::clone(&self.progress),
            self.config.snapshot_every.max(1),
            Duration::from_secs(self.config.snapshot_interval_secs),
        );

        // Intake: targets a previous run resolved are skipped before
        // they ever reach the queue. A failed lookup falls through to
        // processing; delivery is at-least-once, never exactly-once.
        let queue = Arc::new(WorkQueue::new());
        let mut enqueued = 0u64;
        for target in targets {
            match self.dedup.is_done(&campaign, &target.id).await {
                Ok(Some(status)) => {
                    tracing::debug!(target = %target.id, %status, "Already resolved, skipping");
                    let _ = stats.events.send(StatsEvent::Skipped).await;
                }
                Ok(None) => {
                    queue.push(
                        QueuedTarget {
                            target: Arc::new(target),
                            attempts: 0,
                        },
                        None,
                    );
                    enqueued += 1;
                }
                Err(err) => {
                    tracing::warn!(target = %target.id, error = %err, "Dedup lookup failed, processing anyway");
                    queue.push(
                        QueuedTarget {
                            target: Arc::new(target),
                            attempts: 0,
                        },
                        None,
                    );
                    enqueued += 1;
                }
            }
        }

        // Translate the broadcast shutdown signal into a level-triggered
        // flag workers can poll between targets.
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let cancel = Arc::new(cancel_tx);
        let listener = {
            let cancel = Arc::clone(&cancel);
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                loop {
                    match signals.recv().await {
                        Ok(Signal::Shutdown) => {
                            let _ = cancel.send(true);
                            queue.wake_all();
                            break;
                        }
                        Ok(Signal::Finalised) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        if enqueued > 0 {
            let ctx = Arc::new(worker::WorkerCtx {
                campaign: campaign.clone(),
                queue: Arc::clone(&queue),
                quota: Arc::clone(&self.quota),
                limiter: Arc::clone(&self.limiter),
                dedup: Arc::clone(&self.dedup),
                generator: Arc::clone(&self.generator),
                transport: Arc::clone(&self.transport),
                retry: self.config.retry.clone(),
                events: stats.events.clone(),
                cancel: Arc::clone(&cancel),
                remaining: Arc::new(AtomicU64::new(enqueued)),
                persistence_failures: Arc::new(AtomicU32::new(0)),
                persistence_failure_threshold: self.config.persistence_failure_threshold,
                persistence_retry_delay: Duration::from_millis(
                    self.config.persistence_retry_delay_ms,
                ),
            });

            let mut workers = JoinSet::new();
            for worker_id in 0..self.config.concurrency.max(1) {
                workers.spawn(worker::run(Arc::clone(&ctx), worker_id));
            }

            while let Some(joined) = workers.join_next().await {
                if let Err(err) = joined {
                    // Per-target panics are caught inside the worker;
                    // this is the worker loop itself dying.
                    internal!(level = ERROR, "Worker task failed: {err}");
                }
            }
        }

        listener.abort();

        let outcome = stats.finish().await;
        Ok(CampaignReport::assemble(
            outcome.state,
            &outcome.attempts,
            &outcome.failure_examples,
            self.quota.snapshot(),
        ))
    }

    /// Last persisted snapshot for a campaign, for the status surface.
    ///
    /// # Errors
    ///
    /// Propagates progress store read failures.
    pub async fn status(&self, campaign: &CampaignId) -> Result<Option<CampaignState>, DispatchError> {
        Ok(self.progress.load(campaign).await?)
    }
}
