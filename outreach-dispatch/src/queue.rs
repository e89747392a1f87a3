//! Prioritized work queue with scheduled retry releases
//!
//! Targets are offered to workers in descending priority order, with
//! enqueue sequence as the tie-breaker so equal priorities stay FIFO.
//! A retrying target is parked in a delay heap until its release time
//! passes; it never blocks higher-priority eligible work and is never
//! popped early. Pops are exclusive: a popped entry is owned by
//! exactly one worker.

use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use outreach_common::Target;
use parking_lot::Mutex;
use tokio::sync::Notify;

/// One unit of work: a target plus its attempt history position.
#[derive(Debug, Clone)]
pub struct QueuedTarget {
    pub target: Arc<Target>,
    /// Failed attempts so far (0 for a fresh target).
    pub attempts: u32,
}

#[derive(Debug)]
struct ReadyEntry {
    item: QueuedTarget,
    seq: u64,
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for ReadyEntry {}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher priority first, then older sequence first.
        self.item
            .target
            .priority_score
            .cmp(&other.item.target.priority_score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
struct DelayedEntry {
    release_at: Instant,
    seq: u64,
    item: QueuedTarget,
}

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.release_at == other.release_at && self.seq == other.seq
    }
}

impl Eq for DelayedEntry {}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.release_at
            .cmp(&other.release_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Result of a pop attempt.
#[derive(Debug)]
pub enum Popped {
    /// An eligible entry, exclusively owned by the caller.
    Ready(QueuedTarget),
    /// Nothing eligible yet; the earliest scheduled release is this
    /// far away.
    WaitFor(std::time::Duration),
    /// Queue is empty (though other workers may still requeue).
    Empty,
}

#[derive(Debug, Default)]
struct QueueInner {
    ready: BinaryHeap<ReadyEntry>,
    delayed: BinaryHeap<Reverse<DelayedEntry>>,
}

/// The dispatcher's shared work queue.
#[derive(Debug, Default)]
pub struct WorkQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    seq: AtomicU64,
}

impl WorkQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a target, optionally parked until `release_at`.
    pub fn push(&self, item: QueuedTarget, release_at: Option<Instant>) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        {
            let mut inner = self.inner.lock();
            match release_at {
                Some(release_at) if release_at > Instant::now() => {
                    inner.delayed.push(Reverse(DelayedEntry {
                        release_at,
                        seq,
                        item,
                    }));
                }
                _ => inner.ready.push(ReadyEntry { item, seq }),
            }
        }
        self.notify.notify_waiters();
    }

    /// Pop the highest-priority eligible entry.
    pub fn pop(&self) -> Popped {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        // Promote released entries before choosing.
        while let Some(Reverse(head)) = inner.delayed.peek() {
            if head.release_at > now {
                break;
            }
            let Some(Reverse(entry)) = inner.delayed.pop() else {
                break;
            };
            inner.ready.push(ReadyEntry {
                item: entry.item,
                seq: entry.seq,
            });
        }

        if let Some(entry) = inner.ready.pop() {
            return Popped::Ready(entry.item);
        }

        inner.delayed.peek().map_or(Popped::Empty, |Reverse(head)| {
            Popped::WaitFor(head.release_at.saturating_duration_since(now))
        })
    }

    /// Wait until the queue signals new or released work, or `timeout`
    /// elapses.
    pub async fn wait_for_work(&self, timeout: std::time::Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }

    /// Wake every idle worker (used when the run finishes or drains).
    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        inner.ready.len() + inner.delayed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn entry(id: &str, priority: i64) -> QueuedTarget {
        QueuedTarget {
            target: Arc::new(Target::new(id, priority, format!("{id}@example.com"))),
            attempts: 0,
        }
    }

    fn pop_id(queue: &WorkQueue) -> String {
        match queue.pop() {
            Popped::Ready(item) => item.target.id.to_string(),
            other => panic!("expected ready entry, got {other:?}"),
        }
    }

    #[test]
    fn test_pops_in_descending_priority_order() {
        let queue = WorkQueue::new();
        queue.push(entry("low", 1), None);
        queue.push(entry("high", 100), None);
        queue.push(entry("mid", 50), None);

        assert_eq!(pop_id(&queue), "high");
        assert_eq!(pop_id(&queue), "mid");
        assert_eq!(pop_id(&queue), "low");
        assert!(matches!(queue.pop(), Popped::Empty));
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let queue = WorkQueue::new();
        queue.push(entry("first", 10), None);
        queue.push(entry("second", 10), None);
        queue.push(entry("third", 10), None);

        assert_eq!(pop_id(&queue), "first");
        assert_eq!(pop_id(&queue), "second");
        assert_eq!(pop_id(&queue), "third");
    }

    #[test]
    fn test_delayed_entry_not_released_early() {
        let queue = WorkQueue::new();
        queue.push(
            entry("later", 100),
            Some(Instant::now() + Duration::from_secs(60)),
        );
        queue.push(entry("now", 1), None);

        // The delayed high-priority entry does not block eligible work.
        assert_eq!(pop_id(&queue), "now");

        match queue.pop() {
            Popped::WaitFor(wait) => assert!(wait <= Duration::from_secs(60)),
            other => panic!("expected wait, got {other:?}"),
        }
    }

    #[test]
    fn test_released_entry_becomes_eligible() {
        let queue = WorkQueue::new();
        queue.push(
            entry("soon", 10),
            Some(Instant::now() - Duration::from_millis(1)),
        );

        // Release time already passed: promoted on the next pop.
        assert_eq!(pop_id(&queue), "soon");
    }

    #[tokio::test]
    async fn test_exclusive_pop_under_contention() {
        use std::collections::HashSet;

        let queue = Arc::new(WorkQueue::new());
        for i in 0..200 {
            queue.push(entry(&format!("t-{i}"), i), None);
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Popped::Ready(item) = queue.pop() {
                    seen.push(item.target.id.to_string());
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        // No target popped twice, none lost.
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), 200);
        assert_eq!(unique.len(), 200);
    }
}
