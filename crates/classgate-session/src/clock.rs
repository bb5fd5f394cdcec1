//! Token clock: expiry arithmetic on decoded tokens.
//!
//! Every question about "is this token still good?" goes through here, and
//! every answer fails closed:
//!
//! ```text
//!   token          decode ok?   exp vs now        answer
//!   ─────────────  ──────────   ───────────────   ──────────────────────
//!   ""             no           -                 expired, 0s remaining
//!   "garbage"      no           -                 expired, 0s remaining
//!   valid          yes          exp <= now        expired, 0s remaining
//!   valid          yes          exp >  now        live, exp - now seconds
//! ```
//!
//! "Now" comes from a [`Clock`] so tests can move time without sleeping.
//! Timers (`tokio::time`) and token time are deliberately separate: pausing
//! the tokio clock doesn't move [`SystemClock`], and a [`ManualClock`]
//! doesn't fire timers.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use classgate_protocol::{Claims, decode};

/// Source of the current time in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync + 'static {
    /// Current time, Unix seconds.
    fn now_unix(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        // A clock set before 1970 reads as the epoch; every token is
        // then judged against t=0, which still fails closed for exp<=0.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start` (Unix seconds).
    pub fn new(start: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    /// Jumps to an absolute time.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Moves time forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Expiry arithmetic
// ---------------------------------------------------------------------------

/// `true` when the claims' expiry is at or before `now`.
pub fn claims_expired(claims: &Claims, now: i64) -> bool {
    claims.exp <= now
}

/// Whole seconds until the claims expire, never negative.
pub fn claims_remaining(claims: &Claims, now: i64) -> u64 {
    u64::try_from(claims.exp.saturating_sub(now)).unwrap_or(0)
}

/// `true` when `token` is missing, malformed, or past its expiry.
pub fn is_token_expired(token: &str, now: i64) -> bool {
    decode(token).map_or(true, |claims| claims_expired(&claims, now))
}

/// Seconds until `token` expires; 0 for malformed or expired tokens.
pub fn seconds_remaining(token: &str, now: i64) -> u64 {
    decode(token).map_or(0, |claims| claims_remaining(&claims, now))
}

/// `true` when `token` is still live but expires within
/// `threshold_minutes`. An expired token is *not* expiring soon.
pub fn is_expiring_soon(token: &str, now: i64, threshold_minutes: u64) -> bool {
    let remaining = seconds_remaining(token, now);
    remaining > 0 && remaining <= threshold_minutes.saturating_mul(60)
}

/// Human-readable remaining time.
///
/// ```rust
/// use classgate_session::format_remaining;
///
/// assert_eq!(format_remaining(3723), "1h 2m 3s");
/// assert_eq!(format_remaining(330), "5m 30s");
/// assert_eq!(format_remaining(45), "45s");
/// assert_eq!(format_remaining(0), "Expired");
/// ```
pub fn format_remaining(secs: u64) -> String {
    if secs == 0 {
        return "Expired".to_string();
    }
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
