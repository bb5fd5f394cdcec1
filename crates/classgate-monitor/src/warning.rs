//! Warning policy: what, if anything, to tell the user about expiry.
//!
//! ```text
//!   stored token    status               WarningState       should_show
//!   ────────────    ──────────────────   ────────────────   ───────────
//!   none            -                    None               false
//!   present         expired/malformed    Expired            true
//!   present         expiring soon        ExpiringSoon{..}   true
//!   present         live, not soon       None               false
//! ```
//!
//! [`TokenWarning::dismiss`] hides the banner without touching the session.
//! The next recomputation derives `should_show` from scratch, so a dismissed
//! "expiring soon" banner comes back on the following tick, and a session
//! that expires in the meantime is never hidden for more than one period.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use classgate_session::{SessionManager, SessionStatus};
use classgate_tick::Scheduler;
use tokio::sync::watch;

use crate::attach::Attachment;
use crate::{Locale, MonitorError, WarningConfig};

/// Task name under which the warning timer is registered.
pub const WARNING_CHECK_TASK: &str = "warningCheck";

// ---------------------------------------------------------------------------
// Warning
// ---------------------------------------------------------------------------

/// Which warning applies right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarningState {
    #[default]
    None,
    ExpiringSoon {
        remaining_secs: u64,
    },
    Expired,
}

/// A fully-populated warning. `message` is empty when there is nothing to
/// say, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warning {
    pub state: WarningState,
    pub should_show: bool,
    pub message: String,
}

impl Warning {
    /// Derives the warning for `token` at `now`.
    pub fn evaluate(
        token: Option<&str>,
        now: i64,
        threshold_minutes: u64,
        locale: Locale,
    ) -> Self {
        let Some(token) = token else {
            return Self::default();
        };
        let status = SessionStatus::evaluate(Some(token), now, threshold_minutes);

        if status.is_expired {
            Self {
                state: WarningState::Expired,
                should_show: true,
                message: locale.expired_message().to_string(),
            }
        } else if status.is_expiring_soon {
            Self {
                state: WarningState::ExpiringSoon {
                    remaining_secs: status.remaining_secs,
                },
                should_show: true,
                message: locale.expiring_message(status.remaining_secs),
            }
        } else {
            Self::default()
        }
    }

    /// Compact label for status bars, shown only while the banner is.
    pub fn badge(&self, locale: Locale) -> Option<&'static str> {
        self.should_show.then(|| locale.badge_label())
    }
}

// ---------------------------------------------------------------------------
// TokenWarning
// ---------------------------------------------------------------------------

struct WarningInner {
    manager: Arc<SessionManager>,
    threshold_minutes: u64,
    locale: Locale,
    current: watch::Sender<Warning>,
    evaluations: AtomicU64,
}

impl WarningInner {
    fn evaluate(&self) -> Warning {
        let warning = Warning::evaluate(
            self.manager.token().as_deref(),
            self.manager.now(),
            self.threshold_minutes,
            self.locale,
        );
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let previous = self.current.send_replace(warning.clone());
        if std::mem::discriminant(&previous.state) != std::mem::discriminant(&warning.state) {
            tracing::debug!(state = ?warning.state, "session warning changed");
        }
        warning
    }
}

/// Keeps a [`Warning`] current for the stored session.
///
/// Dropping it stops its timer and unregisters its listener.
pub struct TokenWarning {
    inner: Arc<WarningInner>,
    attachment: Attachment,
}

impl TokenWarning {
    /// Derives the warning once and starts tracking it.
    ///
    /// # Errors
    /// [`MonitorError::NoRuntime`] when called outside a Tokio runtime.
    pub fn start(
        manager: Arc<SessionManager>,
        scheduler: &Scheduler,
        config: WarningConfig,
    ) -> Result<Self, MonitorError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(MonitorError::NoRuntime("token warning"));
        }

        let (current, _) = watch::channel(Warning::default());
        let inner = Arc::new(WarningInner {
            manager: Arc::clone(&manager),
            threshold_minutes: config.threshold_minutes,
            locale: config.locale,
            current,
            evaluations: AtomicU64::new(0),
        });
        inner.evaluate();

        let job_inner = Arc::clone(&inner);
        let attachment = Attachment::new(
            &manager,
            scheduler,
            WARNING_CHECK_TASK,
            config.tick_config(),
            move || {
                job_inner.evaluate();
            },
        );

        tracing::debug!(
            period_secs = config.period.as_secs(),
            threshold_minutes = config.threshold_minutes,
            "token warning started"
        );
        Ok(Self { inner, attachment })
    }

    /// The latest warning.
    pub fn current(&self) -> Warning {
        self.inner.current.borrow().clone()
    }

    /// A receiver that observes every new warning, dismissals included.
    pub fn subscribe(&self) -> watch::Receiver<Warning> {
        self.inner.current.subscribe()
    }

    /// Re-derives the warning now, outside the timer.
    pub fn update(&self) -> Warning {
        self.inner.evaluate()
    }

    /// Hides the current banner until the next recomputation.
    ///
    /// Doesn't touch the session: the state and remaining time are left
    /// exactly as they were.
    pub fn dismiss(&self) {
        let dismissed = self.inner.current.send_if_modified(|warning| {
            std::mem::replace(&mut warning.should_show, false)
        });
        if dismissed {
            tracing::debug!("session warning dismissed");
        }
    }

    pub fn locale(&self) -> Locale {
        self.inner.locale
    }

    /// How many times the warning has been derived.
    pub fn evaluations(&self) -> u64 {
        self.inner.evaluations.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.attachment.is_active()
    }

    /// Stops the timer and unregisters the listener. Idempotent.
    pub fn stop(&mut self) {
        if self.attachment.is_active() {
            self.attachment.detach();
            tracing::debug!("token warning stopped");
        }
    }
}

impl std::fmt::Debug for TokenWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenWarning")
            .field("current", &self.current())
            .field("running", &self.is_running())
            .finish()
    }
}
