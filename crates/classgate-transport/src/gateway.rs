//! The session-aware gateway in front of every API call.
//!
//! ```text
//!   send(request)
//!     │
//!     ├─ token stored and expired? ──yes──→ clear(Expired), go to /login,
//!     │                                     Err(TokenExpired)   [nothing sent]
//!     ├─ token stored? ──yes──→ Authorization: Bearer <token>
//!     ▼
//!   transport.send()
//!     │
//!     ├─ 401 ──→ clear(Rejected), go to /login unless already there, Err(Unauthorized)
//!     ├─ 403 ──→ go to /unauthorized, Err(Forbidden)
//!     ├─ other 4xx/5xx ──→ Err(Status { .. })
//!     ▼
//!   Ok(response)
//! ```
//!
//! The login call itself skips the request phase: it never carries a token,
//! so a stale one left in storage can't block a fresh login.
//!
//! [`Gateway::guard`] applies the same session to routes: no live session
//! goes to `/login`, a missing role goes to `/unauthorized`.
//!
//! Redirects go through an injected [`Navigator`], so the gateway works the
//! same in a desktop shell, a terminal tool, or a test.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use classgate_protocol::{Principal, Role};
use classgate_session::{ClearReason, LoginBackend, SessionManager, is_token_expired};
use http::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{ApiRequest, ApiResponse, GatewayError, HttpTransport, Method, StatusCode};

/// Route of the login page.
pub const LOGIN_PATH: &str = "/login";
/// Route shown when the backend forbids an action.
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";
/// Backend endpoint that exchanges credentials for a token.
pub const LOGIN_ENDPOINT: &str = "/auth/login";

// ---------------------------------------------------------------------------
// Navigator
// ---------------------------------------------------------------------------

/// Where the user is, and how to send them somewhere else.
pub trait Navigator: Send + Sync {
    /// The current route.
    fn current_path(&self) -> String;

    /// Moves the user to `path`.
    fn navigate(&self, path: &str);
}

/// A navigator that just remembers where it has been.
#[derive(Debug)]
pub struct MemoryNavigator {
    history: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    /// Starts at `initial`.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![initial.into()]),
        }
    }

    /// Every route visited, oldest first, including the initial one.
    pub fn history(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.lock().last().cloned().unwrap_or_default()
    }

    fn navigate(&self, path: &str) {
        self.lock().push(path.to_string());
    }
}

// ---------------------------------------------------------------------------
// Access
// ---------------------------------------------------------------------------

/// Result of guarding a route with [`Gateway::guard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// A live session holding the required role, if any was required.
    Granted(Principal),
    /// No live session. The user was sent to `/login`; `from` is the route
    /// they were trying to reach, for returning after login.
    Login { from: String },
    /// A live session without the required role. The user was sent to
    /// `/unauthorized`.
    Forbidden,
}

impl Access {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// Wraps a transport with the session rules.
pub struct Gateway<T> {
    transport: T,
    manager: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
}

impl<T: HttpTransport> Gateway<T> {
    pub fn new(
        transport: T,
        manager: Arc<SessionManager>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            transport,
            manager,
            navigator,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// Sends `request` under the session rules described at module level.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        if let Some(token) = self.manager.token() {
            if is_token_expired(&token, self.manager.now()) {
                tracing::warn!(path = %request.path, "session expired, request not sent");
                self.clear_session(ClearReason::Expired);
                self.redirect_to_login();
                return Err(GatewayError::TokenExpired);
            }
            let mut value = HeaderValue::try_from(format!("Bearer {token}")).map_err(|_| {
                crate::TransportError::InvalidRequest(
                    "stored token is not a valid header value".into(),
                )
            })?;
            value.set_sensitive(true);
            request.headers.insert(AUTHORIZATION, value);
        }

        self.dispatch(request).await
    }

    /// Checks the current route against the session.
    ///
    /// Without a live session the user is sent to `/login`. With
    /// `required` set and a principal lacking that role, to
    /// `/unauthorized`. Otherwise the principal is returned and nobody
    /// moves.
    pub fn guard(&self, required: Option<Role>) -> Access {
        let Some(principal) = self.manager.current_principal() else {
            let from = self.navigator.current_path();
            tracing::debug!(%from, "route needs a session");
            self.redirect_to_login();
            return Access::Login { from };
        };
        match required {
            Some(role) if !principal.has_role(role) => {
                tracing::debug!(
                    username = %principal.username,
                    required = role.as_tag(),
                    "route needs another role"
                );
                self.navigator.navigate(UNAUTHORIZED_PATH);
                Access::Forbidden
            }
            _ => Access::Granted(principal),
        }
    }

    /// Response phase: sends `request` as-is and maps the status.
    async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let path = request.path.clone();
        let response = self.transport.send(request).await?;

        let status = response.status;
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(%path, status = 401, "request rejected, clearing session");
            self.clear_session(ClearReason::Rejected);
            self.redirect_to_login();
            Err(GatewayError::Unauthorized)
        } else if status == StatusCode::FORBIDDEN {
            tracing::warn!(%path, status = 403, "request forbidden");
            self.navigator.navigate(UNAUTHORIZED_PATH);
            Err(GatewayError::Forbidden)
        } else if status.is_client_error() || status.is_server_error() {
            tracing::debug!(%path, status = status.as_u16(), "request failed");
            Err(GatewayError::Status {
                status,
                body: response.body,
            })
        } else {
            Ok(response)
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::get(path)).await
    }

    /// `GET` and decode the body as `R`.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, GatewayError> {
        Ok(self.get(path).await?.json()?)
    }

    pub async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, GatewayError> {
        self.send_with_body(Method::POST, path, body).await
    }

    pub async fn put<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, GatewayError> {
        self.send_with_body(Method::PUT, path, body).await
    }

    pub async fn patch<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, GatewayError> {
        self.send_with_body(Method::PATCH, path, body).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(ApiRequest::delete(path)).await
    }

    async fn send_with_body<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, GatewayError> {
        let body = serde_json::to_value(body).map_err(GatewayError::Encode)?;
        self.send(ApiRequest::new(method, path).with_body(body)).await
    }

    fn clear_session(&self, reason: ClearReason) {
        if let Err(error) = self.manager.clear(reason) {
            tracing::error!(%reason, %error, "could not clear session");
        }
    }

    /// Sends the user to the login page unless they are already on it.
    fn redirect_to_login(&self) {
        if self.navigator.current_path() != LOGIN_PATH {
            self.navigator.navigate(LOGIN_PATH);
        }
    }
}

impl<T: HttpTransport> LoginBackend for Gateway<T> {
    type Error = GatewayError;

    /// `POST /auth/login` with `{username, password}` and no token. The
    /// backend answers with the bare token, either as plain text or as a
    /// JSON string.
    async fn login(&self, username: &str, password: &str) -> Result<String, GatewayError> {
        let credentials = serde_json::json!({
            "username": username,
            "password": password,
        });
        let request = ApiRequest::new(Method::POST, LOGIN_ENDPOINT).with_body(credentials);
        let response = self.dispatch(request).await?;
        Ok(token_from_body(&response.body))
    }
}

fn token_from_body(body: &str) -> String {
    let body = body.trim();
    if body.starts_with('"') {
        if let Ok(token) = serde_json::from_str::<String>(body) {
            return token;
        }
    }
    body.to_string()
}

impl<T> std::fmt::Debug for Gateway<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("current_path", &self.navigator.current_path())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_from_body_plain_text() {
        assert_eq!(token_from_body("abc.def.ghi\n"), "abc.def.ghi");
    }

    #[test]
    fn test_token_from_body_json_string() {
        assert_eq!(token_from_body("\"abc.def.ghi\""), "abc.def.ghi");
    }

    #[test]
    fn test_memory_navigator_records_history() {
        let navigator = MemoryNavigator::new("/students");
        navigator.navigate(LOGIN_PATH);
        assert_eq!(navigator.current_path(), LOGIN_PATH);
        assert_eq!(navigator.history(), vec!["/students", "/login"]);
    }
}
