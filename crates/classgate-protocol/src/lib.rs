//! Session token format for Classgate.
//!
//! This crate defines what the client knows about the credential the
//! backend hands out at login:
//!
//! - **Types** ([`Claims`], [`Role`], [`Principal`], [`StoredUser`]):
//!   the decoded payload and the "current user" rebuilt from it.
//! - **Codec** ([`decode`], [`decode_claims`], [`encode_unsigned`]):
//!   turning the compact `header.payload.signature` string into claims.
//! - **Errors** ([`TokenError`]): every way a token can be malformed.
//!
//! # Architecture
//!
//! ```text
//! Transport (HTTP) → Protocol (token → claims) → Session (is it still valid?)
//! ```
//!
//! The protocol layer has no notion of time or storage. It only answers
//! "what does this token say", never "is this token still good".

mod codec;
mod error;
mod types;

pub use codec::{decode, decode_claims, encode_unsigned};
pub use error::TokenError;
pub use types::{Claims, Principal, Role, StoredUser};
