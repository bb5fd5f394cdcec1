//! Decoding (and, for tooling, encoding) of compact session tokens.
//!
//! A session token is three base64url segments joined by dots:
//!
//! ```text
//! header.payload.signature
//!          │
//!          └── the only part the client reads: a JSON claims object
//! ```
//!
//! # Trust boundary
//!
//! The signature is NOT verified here. Verification belongs to the
//! backend, which holds the key. Anything decoded by this module is
//! untrusted metadata for user-experience purposes (showing a username,
//! counting down to expiry, skipping a request that would certainly
//! fail). It must never be used to decide what a user is allowed to do.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::{Claims, TokenError};

/// Header written by [`encode_unsigned`]. `alg: none` makes it obvious
/// that such a token carries no signature.
const UNSIGNED_HEADER: &str = r#"{"alg":"none","typ":"JWT"}"#;

/// Decodes the claims of a session token.
///
/// Splits on `.`, requires exactly three segments, base64url-decodes the
/// middle one and parses it as [`Claims`]. Trailing `=` padding is
/// tolerated because some issuers emit it.
///
/// # Errors
/// Returns a [`TokenError`] describing the first structural problem
/// found. This function never panics, whatever the input.
///
/// # Example
///
/// ```rust
/// use classgate_protocol::{decode, encode_unsigned, Claims};
///
/// let token = encode_unsigned(&Claims::new("alice", 1_700_000_000)).unwrap();
/// let claims = decode(&token).unwrap();
/// assert_eq!(claims.sub.as_deref(), Some("alice"));
///
/// assert!(decode("not-a-jwt").is_err());
/// ```
pub fn decode(token: &str) -> Result<Claims, TokenError> {
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::SegmentCount(segments.len()));
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload)?;

    serde_json::from_slice(&bytes).map_err(TokenError::Json)
}

/// Fail-closed view of [`decode`]: `None` for absent and malformed tokens
/// alike.
pub fn decode_claims(token: &str) -> Option<Claims> {
    decode(token).ok()
}

/// Builds an unsigned token carrying `claims`.
///
/// The signature segment is a fixed placeholder. The backend would
/// reject such a token; it exists for tests and local tooling that need
/// a structurally valid token.
///
/// # Errors
/// Returns [`TokenError::Encode`] if the claims can't be serialized.
pub fn encode_unsigned(claims: &Claims) -> Result<String, TokenError> {
    let payload = serde_json::to_vec(claims).map_err(TokenError::Encode)?;
    Ok(format!(
        "{}.{}.unsigned",
        URL_SAFE_NO_PAD.encode(UNSIGNED_HEADER),
        URL_SAFE_NO_PAD.encode(payload),
    ))
}
