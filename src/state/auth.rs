//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Used by the route guard and identity-aware components to coordinate login
//! redirects and identity-dependent rendering. `AuthStore` is the only writer;
//! everyone else reads through [`AuthStore::subscribe`] or the accessors.
//!
//! ERROR HANDLING
//! ==============
//! Background session checks fail closed: any error is logged and stored as
//! "no identity". Explicit user actions (sign-in, sign-up, sign-out, password
//! change) hand the provider's error back to the caller and leave state as it
//! was.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::net::identity::{IdentityError, IdentityProvider};
use crate::net::types::{AuthEvent, AuthResponse, Credentials, User};

/// Authentication state tracking the current user and loading status.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthState {
    pub user: Option<User>,
    /// `true` until the first session check completes.
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { user: None, loading: true }
    }
}

impl AuthState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Owner of the process-wide [`AuthState`].
pub struct AuthStore {
    identity: Arc<dyn IdentityProvider>,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthStore {
    /// Create the store in its initial state (`loading`, no user) and start
    /// applying the provider's session-change notifications.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        let state = Arc::new(state);
        tokio::spawn(listen(identity.subscribe(), Arc::clone(&state)));
        Self { identity, state }
    }

    /// Receiver that observes every state write.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Re-read the current identity from the provider. Always finishes with
    /// `loading == false`; failures are stored as "no identity".
    pub async fn refresh(&self) {
        self.state.send_modify(|s| s.loading = true);
        let user = match self.identity.current_user().await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "session check failed; treating as signed out");
                None
            }
        };
        debug!(authenticated = user.is_some(), "session check complete");
        self.state.send_modify(|s| {
            s.user = user;
            s.loading = false;
        });
    }

    /// Sign in and store the returned identity.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged; state is not touched.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError> {
        let response = self.identity.sign_in(credentials).await?;
        self.set_user(response.user.clone());
        Ok(response)
    }

    /// Register and store the returned identity.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged; state is not touched.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError> {
        let response = self.identity.sign_up(credentials).await?;
        self.set_user(response.user.clone());
        Ok(response)
    }

    /// Sign out and clear the stored identity.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged; state is not touched.
    pub async fn sign_out(&self) -> Result<(), IdentityError> {
        self.identity.sign_out().await?;
        self.set_user(None);
        Ok(())
    }

    /// Change the signed-in user's password. Does not alter the stored identity.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged.
    pub async fn update_password(&self, new_password: &str) -> Result<User, IdentityError> {
        self.identity.update_password(new_password).await
    }

    fn set_user(&self, user: Option<User>) {
        self.state.send_modify(|s| s.user = user);
    }
}

async fn listen(mut events: broadcast::Receiver<AuthEvent>, state: Arc<watch::Sender<AuthState>>) {
    loop {
        match events.recv().await {
            Ok(event) => apply_event(&state, &event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "session listener lagged; continuing with newest events");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("identity event channel closed");
                break;
            }
        }
    }
}

/// Notifications overwrite the stored identity unconditionally.
fn apply_event(state: &watch::Sender<AuthState>, event: &AuthEvent) {
    debug!(kind = ?event.kind, authenticated = event.session.is_some(), "session change");
    let user = event.user().cloned();
    state.send_modify(|s| s.user = user);
}
