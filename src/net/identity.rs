//! Identity collaborator contract.
//!
//! DESIGN
//! ======
//! The session store talks to the identity service only through
//! [`IdentityProvider`]. Change notifications are pushed over a
//! `tokio::sync::broadcast` channel so the provider never needs a handle
//! back into application state.

use tokio::sync::broadcast;

use super::types::{AuthEvent, AuthResponse, Credentials, User};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity-service operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The request never produced a response (connect failure, timeout).
    #[error("identity request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("identity service rejected request (status {status}): {message}")]
    Api { status: u16, code: Option<String>, message: String },

    /// The response body could not be deserialized.
    #[error("identity response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The operation needs a signed-in session and there is none.
    #[error("no active session")]
    NoSession,
}

impl IdentityError {
    /// `true` when the service itself refused the request (bad credentials,
    /// duplicate account, weak password) rather than the call failing.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Api { status: 400..=499, .. })
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// Operations offered by the managed identity service.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch the identity behind the current session, if any.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the service is unreachable or the
    /// response is malformed.
    async fn current_user(&self) -> Result<Option<User>, IdentityError>;

    /// Sign in with e-mail and password.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Api`] on invalid credentials.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError>;

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Api`] when the service refuses the sign-up.
    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError>;

    /// End the current session.
    ///
    /// # Errors
    ///
    /// Returns an [`IdentityError`] if the service could not revoke the session.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Replace the signed-in user's password.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NoSession`] when nobody is signed in, or the
    /// service's rejection.
    async fn update_password(&self, new_password: &str) -> Result<User, IdentityError>;

    /// Register for session-change notifications. Every call returns a new
    /// receiver that sees all events sent after it was created.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
