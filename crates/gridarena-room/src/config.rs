//! Room configuration: world bounds, movement, admission limits, and the
//! simulated network conditions applied to incoming intents.

use serde::{Deserialize, Serialize};

/// Simulated network conditions applied when an intent is submitted.
///
/// Sampling happens once, at submit time. A change to these values affects
/// intents submitted afterwards; already-delayed intents keep the delay they
/// were assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Lower bound of the artificial delay, in milliseconds.
    pub delay_min_ms: u64,
    /// Upper bound of the artificial delay, in milliseconds.
    pub delay_max_ms: u64,
    /// Probability in `[0.0, 1.0]` that an intent is silently dropped.
    pub drop_prob: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            delay_min_ms: 150,
            delay_max_ms: 300,
            drop_prob: 0.10,
        }
    }
}

impl SimConfig {
    /// No delay, no loss. Intents become visible immediately.
    pub fn disabled() -> Self {
        Self {
            delay_min_ms: 0,
            delay_max_ms: 0,
            drop_prob: 0.0,
        }
    }

    /// The effective `(min, max)` delay window in milliseconds.
    ///
    /// An inverted window (max below min) is coerced to `(min, min)` rather
    /// than rejected, so a partial live update can never poison sampling.
    pub fn delay_window_ms(&self) -> (u64, u64) {
        (self.delay_min_ms, self.delay_max_ms.max(self.delay_min_ms))
    }
}

/// Static and hot-reloadable settings for a single room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// World width; x is clamped to `[0, width]`.
    pub width: f64,
    /// World height; y is clamped to `[0, height]`.
    pub height: f64,
    /// Distance one accepted move intent travels.
    pub step: f64,
    /// Accepted intents per player per tick; excess is rejected.
    pub max_inputs_per_tick: usize,
    /// Fixed tick cadence in Hz.
    pub tick_rate_hz: u32,
    /// Simulated latency and loss for incoming intents.
    pub sim: SimConfig,
    /// Capacity of the bounded intent queue feeding the tick loop.
    pub intent_queue_capacity: usize,
    /// Capacity of the bounded departure queue.
    pub departure_queue_capacity: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
            step: 1.0,
            max_inputs_per_tick: 1,
            tick_rate_hz: gridarena_tick::TickConfig::DEFAULT_TICK_RATE_HZ,
            sim: SimConfig::default(),
            intent_queue_capacity: 256,
            departure_queue_capacity: 64,
        }
    }
}

impl RoomConfig {
    /// Where players with no cached position appear: the world center.
    pub fn spawn_point(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Applies a live update. Absent fields keep their current value.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(step) = update.step {
            self.step = step;
        }
        if let Some(cap) = update.max_inputs_per_tick {
            self.max_inputs_per_tick = cap;
        }
        if let Some(min) = update.simulate_delay_min_ms {
            self.sim.delay_min_ms = min;
        }
        if let Some(max) = update.simulate_delay_max_ms {
            self.sim.delay_max_ms = max;
        }
        if let Some(prob) = update.simulate_drop_prob {
            self.sim.drop_prob = prob.clamp(0.0, 1.0);
        }
    }
}

/// A partial, live-applicable configuration change.
///
/// Every field is optional; only present fields take effect. Applied between
/// ticks, so a tick never observes a half-applied update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigUpdate {
    pub step: Option<f64>,
    pub max_inputs_per_tick: Option<usize>,
    pub simulate_delay_min_ms: Option<u64>,
    pub simulate_delay_max_ms: Option<u64>,
    pub simulate_drop_prob: Option<f64>,
}
