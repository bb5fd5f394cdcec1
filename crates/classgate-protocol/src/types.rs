//! Claims carried by a Classgate session token.
//!
//! These are the structures decoded out of the token's payload segment.
//! The backend issues the token; the client only ever reads it.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The role tag a user holds in the school administration backend.
///
/// The tags are an external contract owned by the backend, so they are
/// serialized exactly as the backend writes them (`"ROLE_ADMIN"`, ...).
///
/// `#[serde(other)]` on `Unknown` means a tag we don't recognize still
/// deserializes instead of failing. A token is not "malformed" just
/// because the backend added a role this client hasn't heard of yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
    #[serde(rename = "ROLE_SECRETARY")]
    Secretary,
    #[serde(rename = "ROLE_COORDINATOR")]
    Coordinator,
    #[serde(rename = "ROLE_TEACHER")]
    Teacher,
    #[serde(rename = "ROLE_STUDENT")]
    Student,
    /// Any tag outside the closed set above.
    #[serde(other)]
    Unknown,
}

impl Role {
    /// The backend's tag for this role.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Admin => "ROLE_ADMIN",
            Self::Secretary => "ROLE_SECRETARY",
            Self::Coordinator => "ROLE_COORDINATOR",
            Self::Teacher => "ROLE_TEACHER",
            Self::Student => "ROLE_STUDENT",
            Self::Unknown => "ROLE_UNKNOWN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

/// The decoded payload of a session token.
///
/// Only `exp` is required. A payload without it fails to deserialize,
/// which is exactly what makes such a token malformed: without an
/// expiration instant the client can't reason about the session at all.
///
/// Times are unix seconds. They are signed so that "seconds until
/// expiry" arithmetic can go negative without wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal identifier (the username).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Role tag of the principal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    /// School unit (tenant) the principal belongs to. Needed to create
    /// unit-scoped records.
    #[serde(
        rename = "unitId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub unit_id: Option<i64>,

    /// Absolute expiration instant.
    pub exp: i64,

    /// Issue instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    /// Creates claims for `sub` that expire at `exp`. Everything else empty.
    pub fn new(sub: impl Into<String>, exp: i64) -> Self {
        Self {
            sub: Some(sub.into()),
            role: None,
            unit_id: None,
            exp,
            iat: None,
            iss: None,
        }
    }

    /// Sets the role (builder style).
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Sets the school unit (builder style).
    pub fn with_unit(mut self, unit_id: i64) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    /// Sets the issue instant (builder style).
    pub fn issued_at(mut self, iat: i64) -> Self {
        self.iat = Some(iat);
        self
    }
}

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// The client's notion of "who is logged in", rebuilt from the stored token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Username (`sub` claim). Empty if the token carried none.
    pub username: String,
    /// Role, if the token carried one.
    pub role: Option<Role>,
    /// School unit, if the token carried one.
    pub unit_id: Option<i64>,
    /// The raw token the principal was decoded from.
    pub token: String,
}

impl Principal {
    /// Builds a principal from a raw token and its already-decoded claims.
    pub fn from_claims(token: impl Into<String>, claims: &Claims) -> Self {
        Self {
            username: claims.sub.clone().unwrap_or_default(),
            role: claims.role,
            unit_id: claims.unit_id,
            token: token.into(),
        }
    }

    /// Returns `true` if the principal holds `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    /// The persisted (token-free) view of this principal.
    pub fn to_stored(&self) -> StoredUser {
        StoredUser {
            username: self.username.clone(),
            role: self.role,
            unit_id: self.unit_id,
        }
    }
}

/// What gets written under the `user` storage key.
///
/// The token itself lives under its own key and is never duplicated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    pub username: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(rename = "unitId", default)]
    pub unit_id: Option<i64>,
}
