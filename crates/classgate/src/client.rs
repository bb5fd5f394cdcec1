//! `Classgate` builder and client handle.
//!
//! This is the entry point for an application. It ties the layers
//! together: storage → session manager → gateway → monitors.

use std::sync::Arc;

use classgate_monitor::{SessionMonitor, TokenWarning};
use classgate_protocol::Principal;
use classgate_session::{
    Clock, FallbackStorage, FileStorage, LoginOutcome, MemoryStorage, SessionManager, Storage,
    SystemClock,
};
use classgate_tick::Scheduler;
use classgate_transport::{Gateway, HttpTransport, MemoryNavigator, Navigator};
#[cfg(feature = "reqwest")]
use classgate_transport::ReqwestTransport;

use crate::{ClassgateConfig, ClassgateError};

/// Builder for configuring a [`Classgate`] client.
///
/// Anything not set explicitly is derived from the config:
/// - storage: a file at `storage_path` falling back to memory, or memory
///   only when no path is configured
/// - clock: the system clock
/// - navigator: a [`MemoryNavigator`] starting at `/`
///
/// # Example
///
/// ```rust,no_run
/// use classgate::prelude::*;
///
/// # async fn run() -> Result<(), ClassgateError> {
/// let client = Classgate::builder()
///     .config(ClassgateConfig::from_env()?)
///     .build()?;
/// client.login("alice", "secret").await?;
/// let _monitor = client.start_monitor()?;
/// # Ok(())
/// # }
/// ```
pub struct ClassgateBuilder {
    config: ClassgateConfig,
    storage: Option<Arc<dyn Storage>>,
    clock: Option<Arc<dyn Clock>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl ClassgateBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ClassgateConfig::default(),
            storage: None,
            clock: None,
            navigator: None,
        }
    }

    pub fn config(mut self, config: ClassgateConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `storage` instead of the configured one.
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Builds a client that talks to `api_base_url` over `reqwest`.
    #[cfg(feature = "reqwest")]
    pub fn build(self) -> Result<Classgate<ReqwestTransport>, ClassgateError> {
        let transport = ReqwestTransport::with_timeout(
            self.config.api_base_url.clone(),
            self.config.request_timeout,
        )?;
        Ok(self.build_with_transport(transport))
    }

    /// Builds a client over any transport.
    pub fn build_with_transport<T: HttpTransport>(self, transport: T) -> Classgate<T> {
        let config = self.config;
        let storage = self.storage.unwrap_or_else(|| default_storage(&config));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(MemoryNavigator::default()));

        let manager = Arc::new(SessionManager::new(storage, clock, config.session_config()));
        let gateway = Gateway::new(transport, Arc::clone(&manager), navigator);

        tracing::debug!(
            api = %config.api_base_url,
            persistent = config.storage_path.is_some(),
            "classgate client built"
        );
        Classgate {
            config,
            manager,
            gateway,
            scheduler: Scheduler::new(),
        }
    }
}

impl Default for ClassgateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_storage(config: &ClassgateConfig) -> Arc<dyn Storage> {
    match &config.storage_path {
        Some(path) => Arc::new(FallbackStorage::new(FileStorage::new(path))),
        None => Arc::new(MemoryStorage::new()),
    }
}

/// A configured client: one session, one gateway, one scheduler.
///
/// Monitors started from it share its scheduler; [`shutdown`](Self::shutdown)
/// stops all of them at once.
pub struct Classgate<T> {
    config: ClassgateConfig,
    manager: Arc<SessionManager>,
    gateway: Gateway<T>,
    scheduler: Scheduler,
}

#[cfg(feature = "reqwest")]
impl Classgate<ReqwestTransport> {
    /// Creates a new builder.
    pub fn builder() -> ClassgateBuilder {
        ClassgateBuilder::new()
    }
}

impl<T: HttpTransport> Classgate<T> {
    pub fn config(&self) -> &ClassgateConfig {
        &self.config
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    pub fn gateway(&self) -> &Gateway<T> {
        &self.gateway
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Logs in through the gateway's `/auth/login`.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, ClassgateError> {
        Ok(self.manager.login(&self.gateway, username, password).await?)
    }

    pub fn logout(&self) -> Result<(), ClassgateError> {
        Ok(self.manager.logout()?)
    }

    /// Picks up a session persisted by an earlier run, if still live.
    pub fn restore(&self) -> Option<Principal> {
        self.manager.restore()
    }

    /// Starts a session monitor with the configured cadence.
    pub fn start_monitor(&self) -> Result<SessionMonitor, ClassgateError> {
        Ok(SessionMonitor::start(
            Arc::clone(&self.manager),
            &self.scheduler,
            self.config.monitor_config(),
        )?)
    }

    /// Starts a warning policy with the configured cadence and locale.
    pub fn start_warning(&self) -> Result<TokenWarning, ClassgateError> {
        Ok(TokenWarning::start(
            Arc::clone(&self.manager),
            &self.scheduler,
            self.config.warning_config(),
        )?)
    }

    /// Stops every timer started from this client.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}

impl<T> std::fmt::Debug for Classgate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classgate")
            .field("config", &self.config)
            .field("tasks", &self.scheduler.active_tasks())
            .finish_non_exhaustive()
    }
}
