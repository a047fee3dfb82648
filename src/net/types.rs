//! Identity-service DTOs shared by the session store and the HTTP client.
//!
//! DESIGN
//! ======
//! Field names mirror the GoTrue JSON payloads so responses deserialize
//! without an intermediate mapping layer. `User` is treated as opaque by the
//! rest of the crate: only its presence drives routing.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::{Deserialize, Serialize};

/// An authenticated identity as reported by the identity service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Service-assigned user identifier (UUID string).
    pub id: String,
    /// Primary e-mail address, if the identity has one.
    #[serde(default)]
    pub email: Option<String>,
    /// Service role (e.g. `"authenticated"`).
    #[serde(default)]
    pub role: Option<String>,
    /// Free-form profile data attached at sign-up.
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    /// RFC 3339 creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A live session: tokens plus the user they belong to.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of `access_token` in seconds.
    #[serde(default)]
    pub expires_in: u64,
    /// Absolute expiry as unix seconds, when the service reports it.
    #[serde(default)]
    pub expires_at: Option<u64>,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// E-mail/password pair submitted on sign-in and sign-up.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self { email: email.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a sign-in or sign-up call.
///
/// Sign-up against a service that requires e-mail confirmation returns a
/// user without a session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthResponse {
    pub user: Option<User>,
    pub session: Option<Session>,
}

impl From<Session> for AuthResponse {
    fn from(session: Session) -> Self {
        Self { user: Some(session.user.clone()), session: Some(session) }
    }
}

/// Kind of session change announced by the identity service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// One session-change notification: the event kind and the session that
/// is current after it, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthChangeEvent,
    pub session: Option<Session>,
}

impl AuthEvent {
    #[must_use]
    pub fn new(kind: AuthChangeEvent, session: Option<Session>) -> Self {
        Self { kind, session }
    }

    /// The identity this event leaves in place.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}
