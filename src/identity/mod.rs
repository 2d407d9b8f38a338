//! Identity service seam.
//!
//! DESIGN
//! ======
//! `AuthController` talks to the service only through [`IdentityApi`], so the
//! HTTP adapter can be swapped for a scripted mock in tests. Implementations
//! never retry; every failure is returned as an [`AuthError`] on the first
//! attempt.

pub mod http;
pub mod types;

pub use http::{HttpIdentityClient, Timeouts};
pub use types::{AuthSuccess, Credentials, RegistrationPayload};

use crate::error::AuthError;
use crate::session::User;

#[async_trait::async_trait]
pub trait IdentityApi: Send + Sync {
    /// Exchange email + password for a token and the account.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` on a rejected pair, `Network`/`Server` otherwise.
    async fn login(&self, credentials: &Credentials) -> Result<AuthSuccess, AuthError>;

    /// Create an account and sign it in.
    ///
    /// # Errors
    ///
    /// `Validation` for duplicate emails or rejected fields, `Network`/`Server`
    /// otherwise.
    async fn register(&self, payload: &RegistrationPayload) -> Result<AuthSuccess, AuthError>;

    /// Resolve a stored token to its account; used at hydration.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` when the token is stale or expired.
    async fn validate_token(&self, token: &str) -> Result<User, AuthError>;

    /// Best-effort server-side sign-out. The portal service has no such
    /// endpoint, so the default does nothing.
    ///
    /// # Errors
    ///
    /// Implementations may report failures; callers ignore them.
    async fn invalidate(&self, token: &str) -> Result<(), AuthError> {
        tracing::trace!(token_len = token.len(), "no server-side sign-out configured");
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_test.rs"]
pub(crate) mod mock;
