//! Input admission: simulated loss/latency sampling and the delay queue
//! that releases intents into the room once their artificial delay expires.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use gridarena_protocol::{Direction, PlayerId};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{self, Instant as TokioInstant};

use crate::config::SimConfig;
use crate::metrics::RoomMetrics;

/// A move request after admission sampling, waiting to be applied by the
/// tick loop.
#[derive(Debug, Clone)]
pub struct Intent {
    pub player_id: PlayerId,
    pub direction: Direction,
    /// Client sequence number; 0 means "not sequenced".
    pub seq: i64,
}

/// An intent with the instant at which it becomes visible to the room.
#[derive(Debug)]
pub(crate) struct ScheduledIntent {
    pub visible_at: TokioInstant,
    pub intent: Intent,
}

/// Samples the fate of one submitted intent.
///
/// Returns `None` if the intent is dropped, otherwise the artificial delay
/// to apply (possibly zero). One sample per submission; later config changes
/// don't retroactively affect it.
pub(crate) fn sample(sim: &SimConfig) -> Option<Duration> {
    let mut rng = rand::rng();
    let drop_prob = sim.drop_prob.clamp(0.0, 1.0);
    if drop_prob > 0.0 && rng.random_bool(drop_prob) {
        return None;
    }
    let (min, max) = sim.delay_window_ms();
    let delay_ms = if max > min {
        rng.random_range(min..=max)
    } else {
        min
    };
    Some(Duration::from_millis(delay_ms))
}

/// Offers an intent to the bounded intent queue without waiting.
///
/// A full queue discards the intent and counts it; a closed queue means the
/// room is gone and the intent is simply dropped.
pub(crate) fn offer(
    intents: &mpsc::Sender<Intent>,
    intent: Intent,
    metrics: &RoomMetrics,
) {
    if let Err(mpsc::error::TrySendError::Full(intent)) =
        intents.try_send(intent)
    {
        metrics.inc_queue_full_discarded();
        tracing::warn!(
            player_id = %intent.player_id,
            seq = intent.seq,
            "intent queue full — discarding"
        );
    }
}

/// Holds delayed intents in a min-heap keyed by release instant, releasing
/// them with a single timer task per room.
///
/// Equal release instants preserve submission order via a monotonic
/// tie-break counter, so simulated delay alone never reorders a client's
/// intents that landed on the same instant.
pub(crate) struct DelayQueue {
    rx: mpsc::UnboundedReceiver<ScheduledIntent>,
    intents: mpsc::Sender<Intent>,
    metrics: Arc<RoomMetrics>,
    heap: BinaryHeap<Reverse<QueuedIntent>>,
    next_order: u64,
}

impl DelayQueue {
    /// Spawns the release task and returns the submission handle.
    ///
    /// The task ends when every submission handle is dropped and the heap
    /// has drained.
    pub fn spawn(
        intents: mpsc::Sender<Intent>,
        metrics: Arc<RoomMetrics>,
    ) -> mpsc::UnboundedSender<ScheduledIntent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self {
            rx,
            intents,
            metrics,
            heap: BinaryHeap::new(),
            next_order: 0,
        };
        tokio::spawn(queue.run());
        tx
    }

    async fn run(mut self) {
        let mut closed = false;
        loop {
            let next_due = self.heap.peek().map(|entry| entry.0.visible_at);
            if closed && next_due.is_none() {
                break;
            }
            tokio::select! {
                scheduled = self.rx.recv(), if !closed => {
                    match scheduled {
                        Some(s) => self.push(s),
                        None => closed = true,
                    }
                }
                _ = Self::wait_until(next_due) => {
                    self.release_due();
                }
            }
        }
    }

    /// Pends forever when nothing is queued; `select!` then only serves the
    /// channel branch.
    async fn wait_until(due: Option<TokioInstant>) {
        match due {
            Some(at) => time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }

    fn push(&mut self, scheduled: ScheduledIntent) {
        self.heap.push(Reverse(QueuedIntent {
            visible_at: scheduled.visible_at,
            order: self.next_order,
            intent: scheduled.intent,
        }));
        self.next_order += 1;
    }

    fn release_due(&mut self) {
        let now = TokioInstant::now();
        while let Some(entry) = self.heap.peek() {
            if entry.0.visible_at > now {
                break;
            }
            let Some(Reverse(queued)) = self.heap.pop() else {
                break;
            };
            offer(&self.intents, queued.intent, &self.metrics);
        }
    }
}

/// Heap entry ordered by release instant, then submission order.
#[derive(Debug)]
struct QueuedIntent {
    visible_at: TokioInstant,
    order: u64,
    intent: Intent,
}

impl PartialEq for QueuedIntent {
    fn eq(&self, other: &Self) -> bool {
        self.visible_at == other.visible_at && self.order == other.order
    }
}

impl Eq for QueuedIntent {}

impl PartialOrd for QueuedIntent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedIntent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.visible_at
            .cmp(&other.visible_at)
            .then(self.order.cmp(&other.order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(id: &str, seq: i64) -> Intent {
        Intent {
            player_id: PlayerId::from(id),
            direction: Direction::Right,
            seq,
        }
    }

    #[test]
    fn test_sample_no_drop_no_delay() {
        let sim = SimConfig::disabled();
        for _ in 0..100 {
            assert_eq!(sample(&sim), Some(Duration::ZERO));
        }
    }

    #[test]
    fn test_sample_always_drops_at_probability_one() {
        let sim = SimConfig {
            delay_min_ms: 0,
            delay_max_ms: 0,
            drop_prob: 1.0,
        };
        for _ in 0..100 {
            assert_eq!(sample(&sim), None);
        }
    }

    #[test]
    fn test_sample_delay_stays_within_window() {
        let sim = SimConfig {
            delay_min_ms: 150,
            delay_max_ms: 300,
            drop_prob: 0.0,
        };
        for _ in 0..200 {
            let delay = sample(&sim).unwrap();
            assert!(delay >= Duration::from_millis(150));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_sample_coerces_inverted_window() {
        let sim = SimConfig {
            delay_min_ms: 200,
            delay_max_ms: 50,
            drop_prob: 0.0,
        };
        for _ in 0..50 {
            assert_eq!(sample(&sim), Some(Duration::from_millis(200)));
        }
    }

    #[test]
    fn test_offer_counts_discards_when_full() {
        let metrics = RoomMetrics::default();
        let (tx, mut rx) = mpsc::channel(1);
        offer(&tx, intent("a", 1), &metrics);
        offer(&tx, intent("a", 2), &metrics);
        assert_eq!(metrics.snapshot().queue_full_discarded, 1);
        assert_eq!(rx.try_recv().unwrap().seq, 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_queue_releases_in_due_order() {
        let metrics = RoomMetrics::shared();
        let (intents_tx, mut intents_rx) = mpsc::channel(16);
        let queue = DelayQueue::spawn(intents_tx, metrics);

        let now = TokioInstant::now();
        // Submitted out of due order on purpose.
        queue
            .send(ScheduledIntent {
                visible_at: now + Duration::from_millis(200),
                intent: intent("a", 2),
            })
            .unwrap();
        queue
            .send(ScheduledIntent {
                visible_at: now + Duration::from_millis(100),
                intent: intent("a", 1),
            })
            .unwrap();

        time::advance(Duration::from_millis(110)).await;
        assert_eq!(intents_rx.recv().await.unwrap().seq, 1);
        assert!(intents_rx.try_recv().is_err());

        time::advance(Duration::from_millis(100)).await;
        assert_eq!(intents_rx.recv().await.unwrap().seq, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_queue_preserves_order_on_equal_instants() {
        let metrics = RoomMetrics::shared();
        let (intents_tx, mut intents_rx) = mpsc::channel(16);
        let queue = DelayQueue::spawn(intents_tx, metrics);

        let at = TokioInstant::now() + Duration::from_millis(50);
        for seq in 1..=3 {
            queue
                .send(ScheduledIntent {
                    visible_at: at,
                    intent: intent("a", seq),
                })
                .unwrap();
        }

        time::advance(Duration::from_millis(60)).await;
        for seq in 1..=3 {
            assert_eq!(intents_rx.recv().await.unwrap().seq, seq);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_queue_drains_after_handle_drop() {
        let metrics = RoomMetrics::shared();
        let (intents_tx, mut intents_rx) = mpsc::channel(16);
        let queue = DelayQueue::spawn(intents_tx, metrics);

        queue
            .send(ScheduledIntent {
                visible_at: TokioInstant::now() + Duration::from_millis(100),
                intent: intent("a", 7),
            })
            .unwrap();
        drop(queue);

        time::advance(Duration::from_millis(110)).await;
        assert_eq!(intents_rx.recv().await.unwrap().seq, 7);
        // Task has exited; the intent channel closes once it drops.
        assert!(intents_rx.recv().await.is_none());
    }
}
