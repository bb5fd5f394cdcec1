//! Login hook: how the session manager obtains a token.
//!
//! The session layer doesn't speak HTTP. It defines the [`LoginBackend`]
//! trait, a single async method that exchanges credentials for a raw
//! token, and the transport layer implements it. Tests implement it with
//! a tiny struct and never touch the network.

/// Exchanges credentials for a session token.
///
/// # Trait bounds
///
/// - `Send + Sync` → the backend can be shared across async tasks.
/// - `Error: 'static` → errors are boxed into
///   [`SessionError::LoginFailed`](crate::SessionError::LoginFailed)
///   without losing their concrete type.
///
/// # Example
///
/// ```rust
/// use classgate_session::LoginBackend;
///
/// /// Hands out a fixed token to anyone. Only for demos.
/// struct FixedToken(String);
///
/// impl LoginBackend for FixedToken {
///     type Error = std::io::Error;
///
///     async fn login(
///         &self,
///         _username: &str,
///         _password: &str,
///     ) -> Result<String, Self::Error> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait LoginBackend: Send + Sync {
    /// The backend's own error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sends the credentials and returns the raw token on success.
    ///
    /// Implementations must not retry: a failed login is corrected by the
    /// user, not by the client.
    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<String, Self::Error>> + Send;
}
