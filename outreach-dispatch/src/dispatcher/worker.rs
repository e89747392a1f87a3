//! Worker loop: pops targets and runs one delivery attempt at a time
//!
//! Exit conditions, in order of precedence: every enqueued target has
//! resolved, or shutdown was signalled. A panic from a collaborator
//! (generator or transport) is caught per target and recorded as a
//! terminal failure; it never takes the worker down.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use futures_util::FutureExt;
use outreach_common::{
    AttemptOutcome, AttemptRecord, CampaignId, TargetId,
    traits::{ContentGenerator, Transport},
    tracing,
};
use outreach_store::{DedupStore, FinalStatus};
use std::panic::AssertUnwindSafe;
use tokio::sync::{mpsc, watch};

use crate::{
    error::{DispatchError, TerminalError},
    policy::{RetryDecision, RetryPolicy, TerminalReason},
    queue::{Popped, QueuedTarget, WorkQueue},
    quota::{QuotaAcquire, QuotaLease, QuotaPool},
    rate_limiter::RateLimiter,
    stats::StatsEvent,
};

/// State shared by every worker in one run.
pub(super) struct WorkerCtx {
    pub campaign: CampaignId,
    pub queue: Arc<WorkQueue>,
    pub quota: Arc<QuotaPool>,
    pub limiter: Arc<RateLimiter>,
    pub dedup: Arc<dyn DedupStore>,
    pub generator: Arc<dyn ContentGenerator>,
    pub transport: Arc<dyn Transport>,
    pub retry: RetryPolicy,
    pub events: mpsc::Sender<StatsEvent>,
    /// Flipping this to `true` drains the whole run.
    pub cancel: Arc<watch::Sender<bool>>,
    /// Unresolved targets; the run ends when this reaches zero.
    pub remaining: Arc<AtomicU64>,
    /// Consecutive failed dedup writes across all workers.
    pub persistence_failures: Arc<AtomicU32>,
    pub persistence_failure_threshold: u32,
    pub persistence_retry_delay: Duration,
}

enum Disposition {
    /// The target reached a final state this pass.
    Resolved,
    /// The target went back to the queue for a later attempt.
    Requeued,
}

pub(super) async fn run(ctx: Arc<WorkerCtx>, worker_id: usize) {
    let mut cancel = ctx.cancel.subscribe();
    tracing::debug!(worker = worker_id, "Worker started");

    loop {
        if ctx.remaining.load(Ordering::Acquire) == 0 {
            ctx.queue.wake_all();
            break;
        }
        if *cancel.borrow() {
            tracing::info!(worker = worker_id, "Draining on shutdown signal");
            ctx.queue.wake_all();
            break;
        }

        match ctx.queue.pop() {
            Popped::Ready(item) => {
                let target_id = item.target.id.clone();
                match AssertUnwindSafe(process(&ctx, item)).catch_unwind().await {
                    Ok(Disposition::Requeued) => {}
                    Ok(Disposition::Resolved) => resolve_one(&ctx),
                    Err(panic) => {
                        let detail = panic_message(panic.as_ref());
                        tracing::error!(
                            worker = worker_id,
                            target = %target_id,
                            detail,
                            "Caught panic while processing target"
                        );
                        mark_done(&ctx, &target_id, FinalStatus::Failed).await;
                        let _ = ctx
                            .events
                            .send(StatsEvent::Failed {
                                category: "worker_panic".to_string(),
                                error: Some(detail.to_string()),
                            })
                            .await;
                        resolve_one(&ctx);
                    }
                }
            }
            Popped::WaitFor(wait) => {
                tokio::select! {
                    () = ctx.queue.wait_for_work(wait) => {}
                    _ = cancel.changed() => {}
                }
            }
            Popped::Empty => {
                // Other workers may still requeue retries; poll again
                // shortly unless woken first.
                tokio::select! {
                    () = ctx.queue.wait_for_work(Duration::from_millis(50)) => {}
                    _ = cancel.changed() => {}
                }
            }
        }
    }

    tracing::debug!(worker = worker_id, "Worker stopped");
}

/// Decrement the unresolved count, waking idle workers when it hits
/// zero so they notice the run is over.
fn resolve_one(ctx: &WorkerCtx) {
    if ctx.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
        ctx.queue.wake_all();
    }
}

async fn process(ctx: &WorkerCtx, item: QueuedTarget) -> Disposition {
    let target = &item.target;

    // Retries stay committed once started; only first assignments
    // consult the dedup store, covering duplicate ids in the load.
    if item.attempts == 0 {
        match ctx.dedup.is_done(&ctx.campaign, &target.id).await {
            Ok(Some(status)) => {
                tracing::debug!(target = %target.id, %status, "Already resolved, skipping");
                let _ = ctx.events.send(StatsEvent::Skipped).await;
                return Disposition::Resolved;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(target = %target.id, error = %err, "Dedup lookup failed, processing anyway");
            }
        }
    }

    let _ = ctx.events.send(StatsEvent::Assigned).await;

    if target.contact_address.trim().is_empty() {
        let err =
            DispatchError::Terminal(TerminalError::InvalidAddress("empty contact address".to_string()));
        tracing::warn!(target = %target.id, "Target has no contact address");
        mark_done(ctx, &target.id, FinalStatus::Failed).await;
        let _ = ctx
            .events
            .send(StatsEvent::Failed {
                category: err.category().to_string(),
                error: Some(err.to_string()),
            })
            .await;
        return Disposition::Resolved;
    }

    // Quota is consumed on acquire and not refunded on failure, so the
    // acquire sits after every check that can avoid an attempt.
    let lease = match ctx.quota.acquire() {
        QuotaAcquire::Acquired(lease) => lease,
        QuotaAcquire::Exhausted => {
            tracing::info!(target = %target.id, "Identity pool exhausted, deferring");
            let _ = ctx.events.send(StatsEvent::Deferred).await;
            return Disposition::Resolved;
        }
    };

    ctx.limiter.acquire(1).await;

    let attempt_number = item.attempts + 1;
    let record = AttemptRecord::begin(
        target.id.clone(),
        attempt_number,
        Some(lease.identity_id.clone()),
    );

    match attempt_delivery(ctx, target, &lease).await {
        Ok(()) => {
            tracing::info!(
                target = %target.id,
                identity = %lease.identity_id,
                attempt = attempt_number,
                "Delivery succeeded"
            );
            let _ = ctx
                .events
                .send(StatsEvent::Attempted(
                    record.resolved(AttemptOutcome::Success, None),
                ))
                .await;
            mark_done(ctx, &target.id, FinalStatus::Done).await;
            let _ = ctx.events.send(StatsEvent::Succeeded).await;
            Disposition::Resolved
        }
        Err(err) => match ctx.retry.classify(&err, attempt_number) {
            RetryDecision::Retry { delay } => {
                tracing::debug!(
                    target = %target.id,
                    attempt = attempt_number,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Attempt failed, retrying after backoff"
                );
                let _ = ctx
                    .events
                    .send(StatsEvent::Attempted(
                        record.resolved(AttemptOutcome::RetryableFailure, Some(err.to_string())),
                    ))
                    .await;
                let _ = ctx.events.send(StatsEvent::Retrying).await;
                ctx.queue.push(
                    QueuedTarget {
                        target: Arc::clone(target),
                        attempts: attempt_number,
                    },
                    Some(Instant::now() + delay),
                );
                Disposition::Requeued
            }
            RetryDecision::Terminal(reason) => {
                let category = match reason {
                    TerminalReason::Exhausted => "retries_exhausted".to_string(),
                    TerminalReason::Classified => err.category().to_string(),
                };
                tracing::warn!(
                    target = %target.id,
                    attempt = attempt_number,
                    category,
                    error = %err,
                    "Target failed terminally"
                );
                let _ = ctx
                    .events
                    .send(StatsEvent::Attempted(
                        record.resolved(AttemptOutcome::TerminalFailure, Some(err.to_string())),
                    ))
                    .await;
                mark_done(ctx, &target.id, FinalStatus::Failed).await;
                let _ = ctx
                    .events
                    .send(StatsEvent::Failed {
                        category,
                        error: Some(err.to_string()),
                    })
                    .await;
                Disposition::Resolved
            }
        },
    }
}

async fn attempt_delivery(
    ctx: &WorkerCtx,
    target: &outreach_common::Target,
    lease: &QuotaLease,
) -> Result<(), DispatchError> {
    let message = ctx.generator.render(target).await?;
    ctx.transport.attempt(&message, &lease.identity_id).await?;
    Ok(())
}

/// Record a terminal status, retrying the write in place.
///
/// A write that still fails after the in-place retries counts toward
/// the shared persistence failure threshold; crossing it drains the
/// run, since continuing would risk re-sending on resume.
async fn mark_done(ctx: &WorkerCtx, target: &TargetId, status: FinalStatus) {
    const WRITE_ATTEMPTS: u32 = 3;

    for attempt in 1..=WRITE_ATTEMPTS {
        match ctx.dedup.mark_done(&ctx.campaign, target, status).await {
            Ok(()) => {
                ctx.persistence_failures.store(0, Ordering::Release);
                return;
            }
            Err(err) if attempt < WRITE_ATTEMPTS => {
                tracing::warn!(target = %target, %status, error = %err, "Dedup write failed, retrying");
                tokio::time::sleep(ctx.persistence_retry_delay).await;
            }
            Err(err) => {
                let failures = ctx.persistence_failures.fetch_add(1, Ordering::AcqRel) + 1;
                tracing::error!(
                    target = %target,
                    %status,
                    error = %err,
                    consecutive_failures = failures,
                    "Dedup write failed after retries"
                );
                if failures >= ctx.persistence_failure_threshold {
                    tracing::error!(
                        "Persistence failure threshold reached, draining run"
                    );
                    let _ = ctx.cancel.send(true);
                    ctx.queue.wake_all();
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}
