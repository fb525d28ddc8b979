//! Per-room counters, shared between the actor, the admission path, and
//! external observers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Lock-free counters for one room.
///
/// The actor and the admission path increment these from their own tasks;
/// anyone holding the `Arc` can read a consistent-enough [`MetricsSnapshot`]
/// without touching the actor.
#[derive(Debug, Default)]
pub struct RoomMetrics {
    ticks: AtomicU64,
    inputs_accepted: AtomicU64,
    rate_limited: AtomicU64,
    stale_rejected: AtomicU64,
    drops_simulated: AtomicU64,
    queue_full_discarded: AtomicU64,
    total_tick_ns: AtomicU64,
}

impl RoomMetrics {
    pub(crate) fn inc_inputs_accepted(&self) {
        self.inputs_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_stale_rejected(&self) {
        self.stale_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_drops_simulated(&self) {
        self.drops_simulated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_queue_full_discarded(&self) {
        self.queue_full_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one completed tick and how long its body took.
    pub(crate) fn record_tick(&self, elapsed: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.total_tick_ns
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Takes a point-in-time reading of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let ticks = self.ticks.load(Ordering::Relaxed);
        let total_tick_ns = self.total_tick_ns.load(Ordering::Relaxed);
        let avg_tick_ms = if ticks > 0 {
            total_tick_ns as f64 / ticks as f64 / 1_000_000.0
        } else {
            0.0
        };
        MetricsSnapshot {
            ticks,
            inputs_accepted: self.inputs_accepted.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            stale_rejected: self.stale_rejected.load(Ordering::Relaxed),
            drops_simulated: self.drops_simulated.load(Ordering::Relaxed),
            queue_full_discarded: self
                .queue_full_discarded
                .load(Ordering::Relaxed),
            total_tick_ns,
            avg_tick_ms,
        }
    }

    /// Convenience constructor for a shared handle.
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// A point-in-time copy of a room's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Completed ticks.
    pub ticks: u64,
    /// Intents applied to the world.
    pub inputs_accepted: u64,
    /// Intents rejected by the per-tick cap.
    pub rate_limited: u64,
    /// Intents rejected as duplicate or out-of-order.
    pub stale_rejected: u64,
    /// Intents dropped by simulated packet loss.
    pub drops_simulated: u64,
    /// Intents discarded because the intent queue was full.
    pub queue_full_discarded: u64,
    /// Total time spent inside tick bodies, in nanoseconds.
    pub total_tick_ns: u64,
    /// Mean tick-body duration in milliseconds (0 before the first tick).
    pub avg_tick_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_starts_at_zero() {
        let metrics = RoomMetrics::default();
        let snap = metrics.snapshot();
        assert_eq!(snap.ticks, 0);
        assert_eq!(snap.inputs_accepted, 0);
        assert_eq!(snap.avg_tick_ms, 0.0);
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = RoomMetrics::default();
        metrics.inc_inputs_accepted();
        metrics.inc_inputs_accepted();
        metrics.inc_rate_limited();
        metrics.inc_stale_rejected();
        metrics.inc_drops_simulated();
        metrics.inc_queue_full_discarded();

        let snap = metrics.snapshot();
        assert_eq!(snap.inputs_accepted, 2);
        assert_eq!(snap.rate_limited, 1);
        assert_eq!(snap.stale_rejected, 1);
        assert_eq!(snap.drops_simulated, 1);
        assert_eq!(snap.queue_full_discarded, 1);
    }

    #[test]
    fn test_avg_tick_ms() {
        let metrics = RoomMetrics::default();
        metrics.record_tick(Duration::from_millis(2));
        metrics.record_tick(Duration::from_millis(4));
        let snap = metrics.snapshot();
        assert_eq!(snap.ticks, 2);
        assert!((snap.avg_tick_ms - 3.0).abs() < 1e-9);
    }
}
