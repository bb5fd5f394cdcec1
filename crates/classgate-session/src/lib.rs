//! Client-side session state for Classgate.
//!
//! This crate owns the answer to "who is logged in, and for how long":
//!
//! 1. **Token clock**: expiry arithmetic that fails closed ([`clock`])
//! 2. **Storage**: the persisted token/user pair ([`Storage`] and backends)
//! 3. **Session manager**: login, logout, queries, and change listeners
//!    ([`SessionManager`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Monitor Layer (above)    ← polls status(), clears expired sessions
//! Transport Layer (above)  ← attaches token(), clears on 401, implements LoginBackend
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)   ← decodes tokens into Claims / Principal
//! ```
//!
//! The token's signature is *not* verified here. The client trusts its own
//! storage and the backend re-validates every request; the decoded claims
//! only drive UI decisions.

#![allow(async_fn_in_trait)]

mod auth;
pub mod clock;
mod error;
mod manager;
mod session;
mod storage;

pub use auth::LoginBackend;
pub use clock::{
    Clock, ManualClock, SystemClock, format_remaining, is_expiring_soon, is_token_expired,
    seconds_remaining,
};
pub use error::{BoxError, SessionError, StorageError};
pub use manager::{Listener, ListenerId, SessionManager};
pub use session::{
    ClearReason, DEFAULT_WARNING_THRESHOLD_MINUTES, LoginOutcome, SessionConfig, SessionStatus,
    TokenInfo,
};
pub use storage::{FallbackStorage, FileStorage, MemoryStorage, Storage, TOKEN_KEY, USER_KEY};
