//! Session expiry monitoring for Classgate.
//!
//! Two independent watchers sit on top of a shared
//! [`SessionManager`](classgate_session::SessionManager), each with its own
//! timer task on a [`Scheduler`](classgate_tick::Scheduler):
//!
//! - [`SessionMonitor`]: the live [`SessionStatus`](classgate_session::SessionStatus)
//!   snapshot (`sessionCheck`, every 30 s). Clears expired sessions.
//! - [`TokenWarning`]: the user-facing [`Warning`] (`warningCheck`, every
//!   10 s). Dismissible, never mutates the session.
//!
//! Both also recompute after every auth change, and both release their
//! timer and listener when stopped or dropped.

mod attach;
mod config;
mod error;
mod monitor;
mod warning;

pub use config::{Locale, MonitorConfig, WarningConfig};
pub use error::MonitorError;
pub use monitor::{SESSION_CHECK_TASK, SessionMonitor};
pub use warning::{TokenWarning, WARNING_CHECK_TASK, Warning, WarningState};
