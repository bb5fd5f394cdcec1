//! Error types for the token layer.
//!
//! Every variant describes a different way a token string can fail to be
//! a well-formed session token. Callers that only care about "usable or
//! not" collapse them all through [`decode_claims`](crate::decode_claims);
//! the distinction is kept for diagnostics.

/// Errors that can occur while decoding or encoding a session token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token string was empty.
    #[error("token is empty")]
    Empty,

    /// The token did not split into exactly three dot-separated segments.
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),

    /// The payload segment was not valid base64url.
    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The payload decoded but isn't a JSON claims object (includes a
    /// missing `exp`).
    #[error("payload is not a valid claims object: {0}")]
    Json(#[source] serde_json::Error),

    /// Serializing claims into a token failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
}
