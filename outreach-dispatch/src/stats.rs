//! Single-writer stats aggregation for a campaign run
//!
//! Workers never touch the counters directly: they emit events over a
//! channel and exactly one task folds them into `CampaignState`. That
//! removes every read-modify-write race on the aggregate counts and
//! makes snapshots trivially consistent (a snapshot is just a clone of
//! the aggregator's own state between events).
//!
//! The aggregator also drives snapshot persistence: one is written
//! after every `snapshot_every` resolutions and on a wall-clock
//! interval, plus a final one when the run ends.

use std::{sync::Arc, time::Duration};

use outreach_common::{AttemptRecord, CampaignState, internal, tracing};
use outreach_store::ProgressStore;
use tokio::sync::{mpsc, watch};

/// Event emitted by a worker or the dispatcher's intake phase.
#[derive(Debug)]
pub enum StatsEvent {
    /// A queued target was handed to a worker.
    Assigned,
    /// A delivery attempt resolved; appended to the run's attempt log.
    Attempted(AttemptRecord),
    /// Transport confirmed the send.
    Succeeded,
    /// The target reached a terminal failure in the given category.
    Failed {
        category: String,
        error: Option<String>,
    },
    /// A retryable failure sent the target back to the queue.
    Retrying,
    /// A previous run already resolved the target.
    Skipped,
    /// The identity pool was exhausted; the target carries over to a
    /// later run.
    Deferred,
}

/// Everything the aggregator produced once the run ended.
#[derive(Debug)]
pub struct StatsOutcome {
    pub state: CampaignState,
    pub attempts: Vec<AttemptRecord>,
    /// One representative error message per failure category.
    pub failure_examples: ahash::AHashMap<String, String>,
}

/// Handle to the aggregation task.
#[derive(Debug)]
pub struct StatsHandle {
    pub events: mpsc::Sender<StatsEvent>,
    pub state: watch::Receiver<CampaignState>,
    task: tokio::task::JoinHandle<StatsOutcome>,
}

impl StatsHandle {
    /// Wait for the aggregator to drain its channel and finish.
    ///
    /// Every `events` sender clone must be dropped first or this will
    /// wait forever.
    pub async fn finish(self) -> StatsOutcome {
        drop(self.events);
        // The aggregator never panics; a join error would mean the
        // runtime is shutting down underneath us.
        self.task.await.unwrap_or_else(|err| {
            internal!(level = ERROR, "Stats aggregator task failed: {err}");
            StatsOutcome {
                state: self.state.borrow().clone(),
                attempts: Vec::new(),
                failure_examples: ahash::AHashMap::new(),
            }
        })
    }
}

/// Spawn the aggregation task for one run.
///
/// `snapshot_every` counts resolutions (success, terminal failure,
/// skip, or deferral) between persisted snapshots; `snapshot_interval`
/// bounds the wall-clock staleness of the persisted snapshot even when
/// resolutions are slow.
pub fn spawn(
    initial: CampaignState,
    progress: Arc<dyn ProgressStore>,
    snapshot_every: u64,
    snapshot_interval: Duration,
) -> StatsHandle {
    let (events_tx, events_rx) = mpsc::channel(1024);
    let (state_tx, state_rx) = watch::channel(initial.clone());

    let task = tokio::spawn(aggregate(
        initial,
        events_rx,
        state_tx,
        progress,
        snapshot_every,
        snapshot_interval,
    ));

    StatsHandle {
        events: events_tx,
        state: state_rx,
        task,
    }
}

async fn aggregate(
    mut state: CampaignState,
    mut events: mpsc::Receiver<StatsEvent>,
    published: watch::Sender<CampaignState>,
    progress: Arc<dyn ProgressStore>,
    snapshot_every: u64,
    snapshot_interval: Duration,
) -> StatsOutcome {
    let mut attempts = Vec::new();
    let mut failure_examples = ahash::AHashMap::new();
    let mut since_snapshot = 0u64;
    let mut ticker = tokio::time::interval(snapshot_interval.max(Duration::from_millis(100)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.reset();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if apply(&mut state, &mut attempts, &mut failure_examples, event) {
                    since_snapshot += 1;
                }
                let _ = published.send(state.clone());

                if since_snapshot >= snapshot_every {
                    persist(&progress, &state).await;
                    since_snapshot = 0;
                }
            }
            _ = ticker.tick() => {
                if since_snapshot > 0 {
                    persist(&progress, &state).await;
                    since_snapshot = 0;
                }
            }
        }
    }

    state.completed_at = Some(chrono::Utc::now());
    persist(&progress, &state).await;
    let _ = published.send(state.clone());

    tracing::info!(
        campaign = %state.campaign_id,
        run = %state.run_id,
        completed = state.completed,
        failed = state.failed,
        skipped = state.skipped,
        deferred = state.deferred,
        "Campaign run finished"
    );

    StatsOutcome {
        state,
        attempts,
        failure_examples,
    }
}

/// Fold one event into the state. Returns whether the event resolved a
/// target (and therefore counts toward the snapshot cadence).
fn apply(
    state: &mut CampaignState,
    attempts: &mut Vec<AttemptRecord>,
    failure_examples: &mut ahash::AHashMap<String, String>,
    event: StatsEvent,
) -> bool {
    match event {
        StatsEvent::Assigned => {
            state.queued = state.queued.saturating_sub(1);
            state.in_flight += 1;
            false
        }
        StatsEvent::Attempted(record) => {
            attempts.push(record);
            false
        }
        StatsEvent::Succeeded => {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.completed += 1;
            true
        }
        StatsEvent::Failed { category, error } => {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.failed += 1;
            if let Some(error) = error {
                failure_examples.entry(category.clone()).or_insert(error);
            }
            *state.by_category.entry(category).or_insert(0) += 1;
            true
        }
        StatsEvent::Retrying => {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.queued += 1;
            false
        }
        StatsEvent::Skipped => {
            // Skips are detected before assignment, so the target is
            // still counted as queued at this point.
            state.queued = state.queued.saturating_sub(1);
            state.skipped += 1;
            true
        }
        StatsEvent::Deferred => {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.deferred += 1;
            true
        }
    }
}

async fn persist(progress: &Arc<dyn ProgressStore>, state: &CampaignState) {
    if let Err(err) = progress.snapshot(state).await {
        // Snapshot loss degrades observability, not correctness; the
        // dedup log remains the source of truth for resume.
        tracing::warn!(
            campaign = %state.campaign_id,
            error = %err,
            "Failed to persist progress snapshot"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use outreach_common::{AttemptOutcome, CampaignId, TargetId};
    use outreach_store::MemoryProgressStore;

    use super::*;

    fn handle_for(total: u64) -> (StatsHandle, Arc<MemoryProgressStore>) {
        let store = Arc::new(MemoryProgressStore::new());
        let state = CampaignState::new(CampaignId::new("stats-test"), total);
        let handle = spawn(state, store.clone(), 2, Duration::from_secs(60));
        (handle, store)
    }

    #[tokio::test]
    async fn test_counters_follow_events() {
        let (handle, _store) = handle_for(4);
        let events = handle.events.clone();

        events.send(StatsEvent::Assigned).await.unwrap();
        events.send(StatsEvent::Succeeded).await.unwrap();
        events.send(StatsEvent::Assigned).await.unwrap();
        events
            .send(StatsEvent::Failed {
                category: "remote_rejection".to_string(),
                error: Some("550 mailbox unavailable".to_string()),
            })
            .await
            .unwrap();
        events.send(StatsEvent::Skipped).await.unwrap();
        events.send(StatsEvent::Assigned).await.unwrap();
        events.send(StatsEvent::Deferred).await.unwrap();
        drop(events);

        let outcome = handle.finish().await;
        assert_eq!(
            outcome.failure_examples.get("remote_rejection").map(String::as_str),
            Some("550 mailbox unavailable")
        );
        let state = outcome.state;
        assert_eq!(state.completed, 1);
        assert_eq!(state.failed, 1);
        assert_eq!(state.skipped, 1);
        assert_eq!(state.deferred, 1);
        assert_eq!(state.in_flight, 0);
        assert_eq!(state.queued, 0);
        assert_eq!(state.by_category.get("remote_rejection"), Some(&1));
        assert!(state.completed_at.is_some());
        assert!(state.is_finished());
    }

    #[tokio::test]
    async fn test_retry_moves_target_back_to_queued() {
        let (handle, _store) = handle_for(1);
        let events = handle.events.clone();

        events.send(StatsEvent::Assigned).await.unwrap();
        events.send(StatsEvent::Retrying).await.unwrap();
        events.send(StatsEvent::Assigned).await.unwrap();
        events.send(StatsEvent::Succeeded).await.unwrap();
        drop(events);

        let state = handle.finish().await.state;
        assert_eq!(state.completed, 1);
        assert_eq!(state.queued, 0);
        assert_eq!(state.in_flight, 0);
    }

    #[tokio::test]
    async fn test_attempt_log_accumulates() {
        let (handle, _store) = handle_for(1);
        let events = handle.events.clone();

        for attempt in 1..=3 {
            let record = AttemptRecord::begin(TargetId::new("t-1"), attempt, None)
                .resolved(AttemptOutcome::RetryableFailure, Some("busy".to_string()));
            events.send(StatsEvent::Attempted(record)).await.unwrap();
        }
        drop(events);

        let outcome = handle.finish().await;
        assert_eq!(outcome.attempts.len(), 3);
        assert_eq!(outcome.attempts[2].attempt_number, 3);
    }

    #[tokio::test]
    async fn test_final_snapshot_is_persisted() {
        let (handle, store) = handle_for(1);
        let events = handle.events.clone();

        events.send(StatsEvent::Assigned).await.unwrap();
        events.send(StatsEvent::Succeeded).await.unwrap();
        drop(events);

        let state = handle.finish().await.state;
        let loaded = store
            .load(&CampaignId::new("stats-test"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.completed, 1);
        assert_eq!(loaded.run_id, state.run_id);
        assert!(loaded.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_watch_channel_publishes_progress() {
        let (handle, _store) = handle_for(2);
        let events = handle.events.clone();
        let mut watched = handle.state.clone();

        events.send(StatsEvent::Assigned).await.unwrap();
        events.send(StatsEvent::Succeeded).await.unwrap();

        // Wait until the success shows up in the published view.
        loop {
            watched.changed().await.unwrap();
            if watched.borrow().completed == 1 {
                break;
            }
        }

        drop(events);
        handle.finish().await;
    }
}
