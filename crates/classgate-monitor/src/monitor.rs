//! Session monitor: keeps a live [`SessionStatus`] snapshot.
//!
//! The snapshot is recomputed:
//! - once, synchronously, when the monitor starts
//! - every `period` (30 s by default)
//! - shortly after every auth change (login, logout, clear)
//! - whenever [`SessionMonitor::update_status`] is called
//!
//! Readers either poll [`status`](SessionMonitor::status) or hold a
//! [`watch::Receiver`] from [`subscribe`](SessionMonitor::subscribe) and
//! await `changed()`.
//!
//! When a recomputation finds the stored token expired, the monitor clears
//! it. That clear notifies every listener, including this monitor's own,
//! which schedules one more recomputation; with nothing stored that one is
//! a quiet no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use classgate_session::{SessionManager, SessionStatus};
use classgate_tick::Scheduler;
use tokio::sync::watch;

use crate::attach::Attachment;
use crate::{MonitorConfig, MonitorError};

/// Task name under which the monitor's timer is registered.
pub const SESSION_CHECK_TASK: &str = "sessionCheck";

struct MonitorInner {
    manager: Arc<SessionManager>,
    threshold_minutes: u64,
    status: watch::Sender<SessionStatus>,
    evaluations: AtomicU64,
}

impl MonitorInner {
    fn evaluate(&self) -> SessionStatus {
        let status = self.manager.status_with_threshold(self.threshold_minutes);
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        self.status.send_replace(status);

        if status.is_expired {
            match self.manager.clear_expired_token() {
                Ok(true) => tracing::info!("expired session cleared by monitor"),
                Ok(false) => {}
                Err(error) => tracing::warn!(%error, "could not clear expired session"),
            }
        }
        status
    }
}

/// Watches the stored session and publishes its status.
///
/// Dropping the monitor stops its timer and unregisters its listener.
pub struct SessionMonitor {
    inner: Arc<MonitorInner>,
    attachment: Attachment,
}

impl SessionMonitor {
    /// Evaluates the session once and starts watching it.
    ///
    /// # Errors
    /// [`MonitorError::NoRuntime`] when called outside a Tokio runtime.
    pub fn start(
        manager: Arc<SessionManager>,
        scheduler: &Scheduler,
        config: MonitorConfig,
    ) -> Result<Self, MonitorError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(MonitorError::NoRuntime("session monitor"));
        }

        let (status, _) = watch::channel(SessionStatus::none());
        let inner = Arc::new(MonitorInner {
            manager: Arc::clone(&manager),
            threshold_minutes: config.warning_threshold_minutes,
            status,
            evaluations: AtomicU64::new(0),
        });
        let initial = inner.evaluate();

        let job_inner = Arc::clone(&inner);
        let attachment = Attachment::new(
            &manager,
            scheduler,
            SESSION_CHECK_TASK,
            config.tick_config(),
            move || {
                job_inner.evaluate();
            },
        );

        tracing::debug!(
            period_secs = config.period.as_secs(),
            valid = initial.is_valid,
            "session monitor started"
        );
        Ok(Self { inner, attachment })
    }

    /// The latest snapshot.
    pub fn status(&self) -> SessionStatus {
        *self.inner.status.borrow()
    }

    /// A receiver that observes every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    /// Recomputes the snapshot now, outside the timer.
    pub fn update_status(&self) -> SessionStatus {
        self.inner.evaluate()
    }

    /// How many times the snapshot has been computed.
    pub fn evaluations(&self) -> u64 {
        self.inner.evaluations.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.attachment.is_active()
    }

    /// Stops the timer and unregisters the listener. Idempotent.
    ///
    /// The last snapshot stays readable.
    pub fn stop(&mut self) {
        if self.attachment.is_active() {
            self.attachment.detach();
            tracing::debug!("session monitor stopped");
        }
    }
}

impl std::fmt::Debug for SessionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMonitor")
            .field("status", &self.status())
            .field("running", &self.is_running())
            .finish()
    }
}
