//! The session manager: the single owner of "who is logged in".
//!
//! It is responsible for:
//! - Exchanging credentials for a token ([`login`](SessionManager::login))
//! - Persisting the token/user pair, atomically as a pair
//! - Answering questions about the stored session (valid? whose? which role?)
//! - Clearing the session on logout, expiry, or rejection
//! - Telling interested parties that any of the above happened
//!
//! # Concurrency note
//!
//! Unlike a per-task registry, the manager is shared: the monitors, the
//! HTTP gateway, and the UI all hold an `Arc<SessionManager>`. Every method
//! takes `&self` and the mutable pieces sit behind short-lived mutexes.
//! No lock is ever held while a listener runs.
//!
//! # Listener notification
//!
//! ```text
//!   notify()
//!     │ lock, clone (id, listener) pairs, unlock
//!     ▼
//!   for each pair:
//!     still registered? ──no──→ skip
//!       │ yes
//!       ▼
//!     call inside catch_unwind ──panic──→ log, continue
//! ```
//!
//! A listener may add or remove listeners (including itself) or even call
//! back into the manager while being notified.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use classgate_protocol::{Principal, Role, StoredUser, decode};

use crate::clock::{Clock, SystemClock, is_token_expired};
use crate::storage::{MemoryStorage, Storage, TOKEN_KEY, USER_KEY};
use crate::{
    ClearReason, LoginBackend, LoginOutcome, SessionConfig, SessionError, SessionStatus,
    StorageError, TokenInfo,
};

/// A callback run whenever the stored session changes.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Identifies a registered listener. Returned by
/// [`SessionManager::add_listener`] and used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the stored session and everyone who wants to hear about it.
///
/// ## Lifecycle
///
/// ```text
/// login() ──→ [token + user stored] ──→ logout()             ──→ [empty]
///                     │            ──→ clear_expired_token() ──→ [empty]
///                     │            ──→ clear(Rejected)       ──→ [empty]
///                     ▼
///              status() / current_principal() / has_role()
/// ```
///
/// Every transition in or out of the stored state notifies listeners.
pub struct SessionManager {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,

    /// Registered listeners. Keyed by id so removal is O(1).
    listeners: Mutex<HashMap<ListenerId, Listener>>,
    next_listener: AtomicU64,

    last_clear: Mutex<Option<ClearReason>>,
}

impl SessionManager {
    /// Creates a manager over `storage`, reading time from `clock`.
    pub fn new(
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            storage,
            clock,
            config,
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            last_clear: Mutex::new(None),
        }
    }

    /// A manager with in-memory storage and the system clock.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(SystemClock),
            SessionConfig::default(),
        )
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current time according to the manager's clock, Unix seconds.
    pub fn now(&self) -> i64 {
        self.clock.now_unix()
    }

    // -----------------------------------------------------------------------
    // Login / logout
    // -----------------------------------------------------------------------

    /// Exchanges credentials for a token and stores the session.
    ///
    /// # Errors
    /// - [`SessionError::EmptyCredential`] if either field is blank. The
    ///   backend is not contacted.
    /// - [`SessionError::LoginFailed`] wrapping the backend's error.
    /// - [`SessionError::InvalidToken`] if the backend's answer doesn't
    ///   decode. Nothing is stored in that case.
    /// - [`SessionError::Storage`] if the pair couldn't be written.
    pub async fn login<B: LoginBackend>(
        &self,
        backend: &B,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, SessionError> {
        if username.trim().is_empty() || password.trim().is_empty() {
            return Err(SessionError::EmptyCredential);
        }

        let token = backend
            .login(username, password)
            .await
            .map_err(|e| SessionError::LoginFailed(Box::new(e)))?;

        let claims = decode(&token)?;
        let principal = Principal::from_claims(token.clone(), &claims);
        let user = serde_json::to_string(&principal.to_stored())
            .map_err(StorageError::Serialize)?;

        self.write_pair(&token, &user)?;
        *lock(&self.last_clear) = None;

        tracing::info!(
            username = %principal.username,
            role = ?principal.role,
            exp = claims.exp,
            "login succeeded"
        );
        self.notify();

        Ok(LoginOutcome { token, principal })
    }

    /// Removes the stored session and notifies listeners.
    ///
    /// Idempotent: logging out with nothing stored still notifies, so a UI
    /// bound to the listener always ends up on the logged-out view.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.clear(ClearReason::Logout).map(|_| ())
    }

    /// Removes the stored session if its token is expired or malformed.
    ///
    /// Returns `true` if something was cleared. With no token stored this
    /// does nothing and notifies no one, which keeps a listener that calls
    /// it from recursing.
    pub fn clear_expired_token(&self) -> Result<bool, SessionError> {
        match self.token() {
            Some(token) if is_token_expired(&token, self.now()) => {
                self.clear(ClearReason::Expired)
            }
            _ => Ok(false),
        }
    }

    /// Removes the stored session for `reason`.
    ///
    /// [`ClearReason::Logout`] always clears and notifies. The other reasons
    /// only act when a token is stored. Returns `true` if listeners were
    /// notified.
    pub fn clear(&self, reason: ClearReason) -> Result<bool, SessionError> {
        if reason != ClearReason::Logout && self.token().is_none() {
            return Ok(false);
        }

        let result = self.clear_pair();
        *lock(&self.last_clear) = Some(reason);

        match &result {
            Ok(()) => tracing::info!(%reason, "session cleared"),
            Err(error) => tracing::error!(%reason, %error, "session clear incomplete"),
        }
        self.notify();

        result.map(|()| true).map_err(SessionError::from)
    }

    /// Why the session was last cleared. Reset by a successful login.
    pub fn last_clear_reason(&self) -> Option<ClearReason> {
        *lock(&self.last_clear)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The raw stored token, if any. Storage errors read as "no token".
    pub fn token(&self) -> Option<String> {
        match self.storage.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(error) => {
                tracing::warn!(%error, "could not read stored token");
                None
            }
        }
    }

    /// The stored user record, if any and if it parses.
    pub fn stored_user(&self) -> Option<StoredUser> {
        let raw = match self.storage.get(USER_KEY) {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!(%error, "could not read stored user");
                return None;
            }
        };
        serde_json::from_str(&raw)
            .inspect_err(|error| tracing::warn!(%error, "stored user is corrupt"))
            .ok()
    }

    /// `true` if a live, well-formed token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.token()
            .is_some_and(|token| !is_token_expired(&token, self.now()))
    }

    /// The principal of the stored token, or `None` if there is no live
    /// token.
    pub fn current_principal(&self) -> Option<Principal> {
        let token = self.token()?;
        let claims = decode(&token).ok()?;
        if claims.exp <= self.now() {
            return None;
        }
        Some(Principal::from_claims(token, &claims))
    }

    /// Session status using the configured warning threshold.
    pub fn status(&self) -> SessionStatus {
        self.status_with_threshold(self.config.warning_threshold_minutes)
    }

    /// Session status using an explicit threshold, in minutes.
    pub fn status_with_threshold(&self, threshold_minutes: u64) -> SessionStatus {
        SessionStatus::evaluate(self.token().as_deref(), self.now(), threshold_minutes)
    }

    /// Everything decodable from the stored token, expired or not.
    pub fn token_info(&self) -> Option<TokenInfo> {
        let token = self.token()?;
        let claims = decode(&token).ok()?;
        Some(TokenInfo::new(&token, claims, self.now()))
    }

    /// `true` if the current principal holds `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.current_principal()
            .is_some_and(|principal| principal.has_role(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_secretary(&self) -> bool {
        self.has_role(Role::Secretary)
    }

    pub fn is_coordinator(&self) -> bool {
        self.has_role(Role::Coordinator)
    }

    pub fn is_teacher(&self) -> bool {
        self.has_role(Role::Teacher)
    }

    pub fn is_student(&self) -> bool {
        self.has_role(Role::Student)
    }

    /// School unit of the current principal.
    pub fn unit_id(&self) -> Option<i64> {
        self.current_principal()?.unit_id
    }

    /// Rebuilds the principal from storage at startup.
    ///
    /// A stored token that is expired or malformed is cleared (notifying
    /// listeners) and `None` is returned.
    pub fn restore(&self) -> Option<Principal> {
        self.token()?;
        match self.current_principal() {
            Some(principal) => {
                tracing::info!(username = %principal.username, "session restored");
                Some(principal)
            }
            None => {
                if let Err(error) = self.clear(ClearReason::Expired) {
                    tracing::warn!(%error, "could not clear stale session");
                }
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Listeners
    // -----------------------------------------------------------------------

    /// Registers `listener`, called after every session change.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).insert(id, Arc::new(listener));
        tracing::debug!(listener = id.0, "auth listener added");
        id
    }

    /// Unregisters a listener. Returns `false` if it wasn't registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = lock(&self.listeners).remove(&id).is_some();
        if removed {
            tracing::debug!(listener = id.0, "auth listener removed");
        }
        removed
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn notify(&self) {
        let snapshot: Vec<(ListenerId, Listener)> = lock(&self.listeners)
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            // Removed by an earlier listener in this same round.
            if !lock(&self.listeners).contains_key(&id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                tracing::error!(listener = id.0, "auth listener panicked");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Pair storage
    // -----------------------------------------------------------------------

    /// Writes token and user as one batch; the store never holds one
    /// without the other.
    fn write_pair(&self, token: &str, user: &str) -> Result<(), StorageError> {
        self.storage.set_many(&[(TOKEN_KEY, token), (USER_KEY, user)])
    }

    /// Removes both keys as one batch.
    fn clear_pair(&self) -> Result<(), StorageError> {
        self.storage.remove_many(&[TOKEN_KEY, USER_KEY])
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("listeners", &self.listener_count())
            .field("last_clear", &self.last_clear_reason())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
