//! Error types for the session layer.

use classgate_protocol::TokenError;

/// Boxed error produced by a [`LoginBackend`](crate::LoginBackend).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during session management.
///
/// These cover the lifecycle of the client's session: logging in,
/// persisting the token, and clearing it again.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Username or password was blank. Rejected locally, the backend
    /// is never contacted.
    #[error("username and password must be non-empty")]
    EmptyCredential,

    /// The login backend refused or failed. The original error is kept
    /// as the source, untouched, so callers can downcast it.
    #[error("login failed: {0}")]
    LoginFailed(#[source] BoxError),

    /// The backend answered with something that isn't a well-formed
    /// session token.
    #[error("backend returned an invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    /// Reading or writing the token/user pair failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised by a [`Storage`](crate::Storage) backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The backing file couldn't be read or written.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file exists but isn't a JSON object of strings.
    #[error("storage is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    /// A value couldn't be serialized for storage.
    #[error("could not serialize value: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The backend is unavailable (disabled, quota exceeded, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
