//! Session types: the snapshots and records the manager hands out.
//!
//! A "session" on the client is nothing more than a stored token plus the
//! user record written next to it. These types describe that pair from the
//! outside:
//! - HOW LONG it has left ([`SessionStatus`])
//! - WHO it belongs to ([`TokenInfo`], [`LoginOutcome`])
//! - WHY it went away ([`ClearReason`])

use std::fmt;

use classgate_protocol::{Claims, Principal, decode};
use serde::{Deserialize, Serialize};

use crate::clock::{claims_expired, claims_remaining, format_remaining};

/// Default lead time, in minutes, before expiry at which a session counts
/// as "expiring soon".
pub const DEFAULT_WARNING_THRESHOLD_MINUTES: u64 = 5;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Threshold used by [`SessionManager::status`](crate::SessionManager::status).
    ///
    /// Default: 5 minutes. 0 disables the "expiring soon" state entirely.
    pub warning_threshold_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            warning_threshold_minutes: DEFAULT_WARNING_THRESHOLD_MINUTES,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// A point-in-time view of the stored session.
///
/// The flags are derived from one reading of the clock, so they never
/// contradict each other:
///
/// ```text
///   remaining_secs   is_valid   is_expired   is_expiring_soon
///   ──────────────   ────────   ──────────   ────────────────
///   0                false      true         false
///   1..=threshold    true       false        true
///   > threshold      true       false        false
/// ```
///
/// `expires_at` is `Some` only while the session is live.
///
/// Serializes with camelCase keys (`isValid`, `remainingSecs`, ...) for
/// hosts that forward snapshots to a UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub is_valid: bool,
    pub is_expired: bool,
    pub is_expiring_soon: bool,
    pub remaining_secs: u64,
    /// Expiry instant, Unix seconds.
    pub expires_at: Option<i64>,
}

impl SessionStatus {
    /// The status of "no session at all": expired, nothing remaining.
    pub const fn none() -> Self {
        Self {
            is_valid: false,
            is_expired: true,
            is_expiring_soon: false,
            remaining_secs: 0,
            expires_at: None,
        }
    }

    /// Evaluates `token` at `now`. Missing or malformed tokens evaluate to
    /// [`SessionStatus::none`].
    pub fn evaluate(token: Option<&str>, now: i64, threshold_minutes: u64) -> Self {
        match token.map(decode) {
            Some(Ok(claims)) => Self::from_claims(&claims, now, threshold_minutes),
            _ => Self::none(),
        }
    }

    /// Evaluates already-decoded claims at `now`.
    pub fn from_claims(claims: &Claims, now: i64, threshold_minutes: u64) -> Self {
        if claims_expired(claims, now) {
            return Self::none();
        }
        let remaining_secs = claims_remaining(claims, now);
        Self {
            is_valid: true,
            is_expired: false,
            is_expiring_soon: remaining_secs <= threshold_minutes.saturating_mul(60),
            remaining_secs,
            expires_at: Some(claims.exp),
        }
    }

    /// Remaining time, formatted for display.
    pub fn remaining_display(&self) -> String {
        format_remaining(self.remaining_secs)
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::none()
    }
}

// ---------------------------------------------------------------------------
// ClearReason
// ---------------------------------------------------------------------------

/// Why the stored session was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearReason {
    /// The user logged out.
    Logout,
    /// The token reached its expiry.
    Expired,
    /// The backend rejected the token (HTTP 401).
    Rejected,
}

impl fmt::Display for ClearReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClearReason::Logout => "logout",
            ClearReason::Expired => "expired",
            ClearReason::Rejected => "rejected",
        })
    }
}

// ---------------------------------------------------------------------------
// LoginOutcome / TokenInfo
// ---------------------------------------------------------------------------

/// What a successful login hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub token: String,
    pub principal: Principal,
}

/// Everything known about the stored token, for diagnostics screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub principal: Principal,
    pub claims: Claims,
    pub is_expired: bool,
    pub remaining_secs: u64,
    /// `remaining_secs` formatted, e.g. `"4m 10s"` or `"Expired"`.
    pub remaining: String,
}

impl TokenInfo {
    pub(crate) fn new(token: &str, claims: Claims, now: i64) -> Self {
        let remaining_secs = claims_remaining(&claims, now);
        Self {
            principal: Principal::from_claims(token, &claims),
            is_expired: claims_expired(&claims, now),
            remaining_secs,
            remaining: format_remaining(remaining_secs),
            claims,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classgate_protocol::encode_unsigned;

    const NOW: i64 = 1_700_000_000;

    fn token(exp: i64) -> String {
        encode_unsigned(&Claims::new("ana", exp)).unwrap()
    }

    #[test]
    fn test_evaluate_no_token_is_expired() {
        let status = SessionStatus::evaluate(None, NOW, 5);
        assert!(!status.is_valid);
        assert!(status.is_expired);
        assert!(!status.is_expiring_soon);
        assert_eq!(status.remaining_secs, 0);
        assert_eq!(status.expires_at, None);
    }

    #[test]
    fn test_evaluate_garbage_token_is_expired() {
        let status = SessionStatus::evaluate(Some("x.y.z"), NOW, 5);
        assert_eq!(status, SessionStatus::none());
    }

    #[test]
    fn test_evaluate_live_token_far_from_expiry() {
        let status = SessionStatus::evaluate(Some(&token(NOW + 3600)), NOW, 5);
        assert!(status.is_valid);
        assert!(!status.is_expired);
        assert!(!status.is_expiring_soon);
        assert_eq!(status.remaining_secs, 3600);
        assert_eq!(status.expires_at, Some(NOW + 3600));
    }

    #[test]
    fn test_evaluate_live_token_inside_threshold() {
        let status = SessionStatus::evaluate(Some(&token(NOW + 240)), NOW, 5);
        assert!(status.is_valid);
        assert!(status.is_expiring_soon);
        assert_eq!(status.remaining_display(), "4m 0s");
    }

    #[test]
    fn test_evaluate_flags_never_contradict() {
        for offset in [-10, 0, 1, 299, 300, 301, 10_000] {
            let s = SessionStatus::evaluate(Some(&token(NOW + offset)), NOW, 5);
            assert_eq!(s.is_valid, !s.is_expired, "offset {offset}");
            assert!(!(s.is_expiring_soon && s.is_expired), "offset {offset}");
            assert_eq!(s.remaining_secs == 0, s.is_expired, "offset {offset}");
            assert_eq!(s.expires_at.is_some(), s.is_valid, "offset {offset}");
        }
    }

    #[test]
    fn test_token_info_formats_remaining() {
        let raw = token(NOW + 330);
        let claims = decode(&raw).unwrap();
        let info = TokenInfo::new(&raw, claims, NOW);
        assert_eq!(info.principal.username, "ana");
        assert_eq!(info.remaining, "5m 30s");
        assert!(!info.is_expired);
    }

    #[test]
    fn test_clear_reason_display() {
        assert_eq!(ClearReason::Rejected.to_string(), "rejected");
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let status = SessionStatus::evaluate(Some(&token(NOW + 90)), NOW, 5);
        let json = serde_json::to_value(status).unwrap();
        assert_eq!(json["isValid"], true);
        assert_eq!(json["isExpiringSoon"], true);
        assert_eq!(json["remainingSecs"], 90);
        assert_eq!(json["expiresAt"], NOW + 90);
    }

    #[test]
    fn test_session_config_deserializes_with_defaults() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.warning_threshold_minutes, DEFAULT_WARNING_THRESHOLD_MINUTES);
    }
}
