//! Error types for the transport layer.

use http::StatusCode;

/// Errors raised while moving a request over the wire.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request couldn't be built (bad URL, bad header value, ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP client failed: connect, timeout, TLS, body read.
    #[cfg(feature = "reqwest")]
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A transport other than the built-in one failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The response body isn't the JSON the caller asked for.
    #[error("response body is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Errors returned by the [`Gateway`](crate::Gateway).
///
/// The first three carry a side effect the caller doesn't need to repeat:
/// by the time they are returned, the session has been cleared and/or the
/// navigator has been redirected.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The stored token had already expired. Nothing was sent; the session
    /// was cleared and the user sent to the login page.
    #[error("session expired, request not sent")]
    TokenExpired,

    /// The backend answered 401. The session was cleared.
    #[error("request rejected as unauthenticated (401)")]
    Unauthorized,

    /// The backend answered 403. The session was kept.
    #[error("request forbidden (403)")]
    Forbidden,

    /// Any other error status, passed through untouched.
    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: String },

    /// The request body couldn't be serialized.
    #[error("could not encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
