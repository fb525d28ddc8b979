//! Fixed-cadence tick scheduler for Gridarena rooms.
//!
//! Each room advances its world on a fixed period (default 20 Hz, 50 ms).
//! The scheduler guarantees that exactly one tick fires at a time and that
//! no cycle is ever skipped: if a tick's work overruns the period, the next
//! firing is simply late — deadlines keep their original cadence, so the
//! loop catches back up without ever running two ticks concurrently.
//!
//! # Integration
//!
//! The scheduler sits inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         info = scheduler.wait_for_tick() => {
//!             room.run_tick(info.tick);
//!         }
//!     }
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the tick scheduler.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Tick rate in Hz. 0 is coerced to [`Self::DEFAULT_TICK_RATE_HZ`].
    pub tick_rate_hz: u32,
    /// Random jitter (0–max µs) added to the *first* tick to desynchronize
    /// rooms created at the same instant (thundering-herd mitigation).
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: Self::DEFAULT_TICK_RATE_HZ,
            initial_jitter_us: 2_000, // 0–2 ms default jitter
        }
    }
}

impl TickConfig {
    /// Default world cadence: 20 ticks per second (50 ms period).
    pub const DEFAULT_TICK_RATE_HZ: u32 = 20;

    /// Maximum supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    /// Creates a config for a specific tick rate with default jitter.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`]. A zero rate falls
    /// back to the default; rates above [`Self::MAX_TICK_RATE_HZ`] are
    /// capped with a warning.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz == 0 {
            self.tick_rate_hz = Self::DEFAULT_TICK_RATE_HZ;
        }
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum — clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self
    }

    /// Duration of a single tick period.
    pub fn tick_duration(&self) -> Duration {
        let hz = if self.tick_rate_hz == 0 {
            Self::DEFAULT_TICK_RATE_HZ
        } else {
            self.tick_rate_hz
        };
        Duration::from_secs_f64(1.0 / f64::from(hz))
    }
}

// ---------------------------------------------------------------------------
// Tick info
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1).
    pub tick: u64,
    /// The fixed tick period. Game logic should use this, not wall-clock
    /// elapsed time, so simulation stays deterministic.
    pub dt: Duration,
    /// `true` if this tick fired noticeably after its deadline (the
    /// previous cycle overran its budget).
    pub late: bool,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-cadence tick scheduler. One per room actor.
pub struct TickScheduler {
    tick_duration: Duration,
    tick_count: u64,
    /// When the next tick should fire.
    next_tick: TokioInstant,
}

impl TickScheduler {
    /// Creates a new scheduler from config.
    ///
    /// The first tick is scheduled one period out, with optional jitter to
    /// prevent rooms created together from ticking in lockstep.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let jitter = if config.initial_jitter_us > 0 {
            let us = rand::rng().random_range(0..config.initial_jitter_us);
            Duration::from_micros(us)
        } else {
            Duration::ZERO
        };

        debug!(
            rate_hz = config.tick_rate_hz,
            period_ms = tick_duration.as_secs_f64() * 1000.0,
            "tick scheduler created"
        );

        Self {
            tick_duration,
            tick_count: 0,
            next_tick: TokioInstant::now() + tick_duration + jitter,
        }
    }

    /// Creates a scheduler for a specific tick rate with default settings.
    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due, then returns its [`TickInfo`].
    ///
    /// Deadlines advance by exactly one period per call, so a cycle that
    /// overran only delays the next firing — it is never skipped, and two
    /// ticks never overlap (the caller runs the tick body before awaiting
    /// again).
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let deadline = self.next_tick;
        time::sleep_until(deadline).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.next_tick = deadline + self.tick_duration;

        // >10% past the deadline counts as late.
        let late_by = now.saturating_duration_since(deadline);
        let late = late_by > self.tick_duration / 10;
        if late {
            warn!(
                tick = self.tick_count,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick fired late — previous cycle overran its period"
            );
        }

        trace!(tick = self.tick_count, late, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: self.tick_duration,
            late,
        }
    }

    /// Number of ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The fixed tick period.
    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }
}
