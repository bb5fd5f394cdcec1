//! Unified error type for Classgate.

use classgate_monitor::MonitorError;
use classgate_protocol::TokenError;
use classgate_session::{SessionError, StorageError};
use classgate_transport::{GatewayError, TransportError};

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `classgate` meta-crate, you deal with this single
/// error type instead of importing errors from each sub-crate.
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ClassgateError {
    /// A token couldn't be decoded.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Login, logout, or session storage failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Session storage failed outside of a session operation.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The HTTP client couldn't be built or a request couldn't be sent.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An API call was refused locally or by the backend.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A monitor couldn't be started.
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    /// A configuration value is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable holds a value that can't be parsed.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
