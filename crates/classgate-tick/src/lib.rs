//! Fixed-period tickers and named periodic tasks for Classgate.
//!
//! Session checks are polling loops: "every 30 seconds, look at the token
//! again". This crate provides the two pieces those loops are built from:
//!
//! - [`TickScheduler`]: a single fixed-period ticker with overrun
//!   handling and initial jitter.
//! - [`Scheduler`]: a registry of named periodic tasks
//!   (`sessionCheck`, `warningCheck`, ...) whose lifetime is tied to a
//!   [`TaskHandle`]. Dropping the handle stops the task.
//!
//! # Event-driven mode
//!
//! When `period` is zero the ticker enters event-driven mode and
//! [`TickScheduler::wait_for_tick`] pends forever. A task spawned with such
//! a config only runs when its trigger is notified.
//!
//! # Integration
//!
//! The ticker is designed to sit inside a `tokio::select!` loop next to an
//! event source:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = trigger.notified() => job(),
//!         _ = ticker.wait_for_tick() => job(),
//!     }
//! }
//! ```

mod scheduler;

pub use scheduler::{Scheduler, TaskHandle};

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires late (the runtime was busy, the machine
/// was suspended, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickPolicy {
    /// Skip the missed tick(s) and resume from now.
    /// After a laptop wakes from sleep this produces one check, not a burst.
    #[default]
    Skip,
    /// Keep the original cadence. The next tick fires at its originally
    /// scheduled time even if that is already in the past.
    Drop,
}

/// Full configuration for a ticker.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Time between ticks. `Duration::ZERO` = event-driven (never fires).
    pub period: Duration,
    /// Overrun handling policy.
    pub policy: TickPolicy,
    /// Random jitter (0..jitter) added to the *first* tick so that tickers
    /// created at the same instant don't fire in lockstep.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            period: Duration::ZERO,
            policy: TickPolicy::default(),
            initial_jitter: Duration::from_millis(250),
        }
    }
}

impl TickConfig {
    /// Smallest period accepted. Anything shorter is a busy loop.
    pub const MIN_PERIOD: Duration = Duration::from_millis(10);

    /// A config for `period` without initial jitter.
    pub fn exact(period: Duration) -> Self {
        Self {
            period,
            initial_jitter: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Fix any out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`TickScheduler::new`]. A non-zero period
    /// shorter than [`Self::MIN_PERIOD`] is raised to it; jitter is capped
    /// at one period.
    pub fn validated(mut self) -> Self {
        if !self.period.is_zero() && self.period < Self::MIN_PERIOD {
            warn!(
                period_ms = self.period.as_millis() as u64,
                min_ms = Self::MIN_PERIOD.as_millis() as u64,
                "tick period below minimum, raising"
            );
            self.period = Self::MIN_PERIOD;
        }
        if !self.period.is_zero() && self.initial_jitter > self.period {
            self.initial_jitter = self.period;
        }
        self
    }

    /// Duration of a single tick. Returns `None` for event-driven mode.
    pub fn tick_duration(&self) -> Option<Duration> {
        if self.period.is_zero() {
            None
        } else {
            Some(self.period)
        }
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Fixed-period ticker.
pub struct TickScheduler {
    config: TickConfig,
    tick_duration: Option<Duration>,
    tick_count: u64,
    /// When the next tick should fire (Tokio instant for `sleep_until`).
    next_tick: Option<TokioInstant>,
}

impl TickScheduler {
    /// Create a new ticker from config. The first tick is due one period
    /// (plus jitter) from now.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();

        let next_tick = tick_duration.map(|d| {
            let max_us = config.initial_jitter.as_micros() as u64;
            let jitter = if max_us == 0 {
                Duration::ZERO
            } else {
                Duration::from_micros(rand::rng().random_range(0..max_us))
            };
            TokioInstant::now() + d + jitter
        });

        match tick_duration {
            None => debug!("ticker created in event-driven mode"),
            Some(d) => debug!(
                period_ms = d.as_millis() as u64,
                policy = ?config.policy,
                "ticker created"
            ),
        }

        Self {
            config,
            tick_duration,
            tick_count: 0,
            next_tick,
        }
    }

    /// Wait until the next tick is due and return its number (from 1).
    ///
    /// In event-driven mode this future pends forever. It is cancel-safe:
    /// if a `select!` drops it before the deadline, no state has changed.
    pub async fn wait_for_tick(&mut self) -> u64 {
        let (next, tick_dur) = match (self.next_tick, self.tick_duration) {
            (Some(next), Some(dur)) => (next, dur),
            _ => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;

        // Did we wake up significantly late?
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > tick_dur / 10;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    let ticks_skipped = (late_by.as_nanos() / tick_dur.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_millis() as u64,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + tick_dur
            }
            TickPolicy::Drop => next + tick_dur,
        });

        trace!(tick = self.tick_count, overrun, "tick fired");
        self.tick_count
    }
}
