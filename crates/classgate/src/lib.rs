//! # Classgate
//!
//! Client-side session layer for the Classgate school administration API.
//!
//! Classgate keeps track of who is logged in, for how long, and what to do
//! when that runs out. It decodes the backend's session token, persists it,
//! polls it for expiry, warns the user before it lapses, and guards every
//! API call with it.
//!
//! ```text
//!   login ──→ SessionManager (token + user stored)
//!                 │                    ▲
//!                 ▼                    │ clear on expiry / 401
//!   Gateway ── Bearer token ──→ backend
//!                 │
//!   SessionMonitor (30 s) ── status snapshot
//!   TokenWarning   (10 s) ── "expires in 4m 10s"
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use classgate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ClassgateError> {
//!     classgate::init_tracing();
//!
//!     let client = Classgate::builder()
//!         .config(ClassgateConfig::from_env()?)
//!         .build()?;
//!     client.login("alice", "secret").await?;
//!
//!     let warning = client.start_warning()?;
//!     let students = client.gateway().get("/students").await?;
//!     println!("{} / {:?}", students.body, warning.current());
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;

pub use client::{Classgate, ClassgateBuilder};
pub use config::{ClassgateConfig, ENV_API_URI, ENV_LOCALE, ENV_STORAGE_PATH, ENV_WARNING_MINUTES};
pub use error::{ClassgateError, ConfigError};

pub use classgate_monitor as monitor;
pub use classgate_protocol as protocol;
pub use classgate_session as session;
pub use classgate_tick as tick;
pub use classgate_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber that logs to stderr.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this
/// more than once, or after another subscriber was installed, does
/// nothing.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Everything an application usually needs, in one import.
pub mod prelude {
    pub use crate::{Classgate, ClassgateBuilder, ClassgateConfig, ClassgateError};
    pub use classgate_monitor::{
        Locale, MonitorConfig, SessionMonitor, TokenWarning, Warning, WarningConfig,
        WarningState,
    };
    pub use classgate_protocol::{Claims, Principal, Role};
    pub use classgate_session::{
        ClearReason, Clock, FallbackStorage, FileStorage, LoginBackend, ManualClock,
        MemoryStorage, SessionManager, SessionStatus, Storage, SystemClock,
    };
    pub use classgate_tick::Scheduler;
    pub use classgate_transport::{
        Access, ApiRequest, ApiResponse, Gateway, GatewayError, HttpTransport,
        MemoryNavigator, Navigator,
    };
    #[cfg(feature = "reqwest")]
    pub use classgate_transport::ReqwestTransport;
}
