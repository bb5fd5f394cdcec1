//! HTTP transport layer for Classgate.
//!
//! Provides the [`HttpTransport`] trait that abstracts over how a request
//! reaches the backend, and the [`Gateway`] that wraps any transport with
//! the session rules: attach the bearer token, refuse to send with an
//! expired one, and react to 401/403.
//!
//! # Feature Flags
//!
//! - `reqwest` (default): [`ReqwestTransport`], backed by `reqwest`

#![allow(async_fn_in_trait)]

mod error;
mod gateway;
#[cfg(feature = "reqwest")]
mod http_client;

pub use error::{GatewayError, TransportError};
pub use gateway::{
    Access, Gateway, LOGIN_ENDPOINT, LOGIN_PATH, MemoryNavigator, Navigator, UNAUTHORIZED_PATH,
};
pub use http::{HeaderMap, HeaderValue, Method, StatusCode};
#[cfg(feature = "reqwest")]
pub use http_client::ReqwestTransport;

use serde::de::DeserializeOwned;

/// An outgoing API call, relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path below the base URL, e.g. `/students/3`.
    pub path: String,
    pub headers: HeaderMap,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attaches a JSON body.
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The token in the `Authorization: Bearer` header, if one is set.
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(http::header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

/// A response as seen by the gateway: status, headers, and the body text.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_str(&self.body).map_err(TransportError::Decode)
    }
}

/// Sends requests to the backend.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one transport is shared by every caller.
/// - The returned future is `Send` so gateway calls can run on any task.
pub trait HttpTransport: Send + Sync + 'static {
    /// Sends `request` and returns whatever the backend answered, error
    /// statuses included. Only failures to get an answer are errors.
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl std::future::Future<Output = Result<ApiResponse, TransportError>> + Send;
}
