//! GoTrue REST client.
//!
//! DESIGN
//! ======
//! Speaks the `/auth/v1` API used by Supabase Auth and self-hosted GoTrue.
//! The client keeps the current session in memory only and announces every
//! change on a broadcast channel, mirroring the service SDK's
//! `onAuthStateChange` stream.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx answers become [`IdentityError::Api`] with the service's message.
//! A 401/403 on the user endpoint triggers one refresh-token exchange and a
//! retry; if the service refuses the refresh, the session is dropped with a
//! `SignedOut` event and the caller sees "no identity". A 401/404 on logout
//! means the session is already gone and is not surfaced as an error.

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;

use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use super::identity::{IdentityError, IdentityProvider};
use super::types::{AuthChangeEvent, AuthEvent, AuthResponse, Credentials, Session, User};
use crate::config::IdentityConfig;

const AUTH_PATH_PREFIX: &str = "/auth/v1";
const EVENT_CHANNEL_CAPACITY: usize = 32;

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl GoTrueClient {
    /// Build a client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| IdentityError::HttpClientBuild(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            base_url: config.url.clone(),
            api_key: config.api_key.clone(),
            session: RwLock::new(None),
            events,
        })
    }

    /// The session currently held by the client.
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// Adopt a session obtained elsewhere (e.g. an OAuth redirect) and
    /// announce it as the initial session.
    pub async fn restore_session(&self, session: Session) {
        debug!(user_id = %session.user.id, "session restored");
        self.store_session(&session, AuthChangeEvent::InitialSession).await;
    }

    /// Exchange the refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::NoSession`] when there is nothing to refresh,
    /// or the service's rejection of the refresh token.
    pub async fn refresh_session(&self) -> Result<Session, IdentityError> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(IdentityError::NoSession)?;

        let url = format!("{}?grant_type=refresh_token", self.endpoint("/token"));
        let body = RefreshBody { refresh_token: &refresh_token };
        let text = self.send(self.request(Method::POST, &url, None).json(&body)).await?;
        let session: Session = parse_json(&text)?;

        debug!(user_id = %session.user.id, "session refreshed");
        self.store_session(&session, AuthChangeEvent::TokenRefreshed).await;
        Ok(session)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{AUTH_PATH_PREFIX}{path}", self.base_url)
    }

    fn request(&self, method: Method, url: &str, access_token: Option<&str>) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token.unwrap_or(self.api_key.as_str()))
    }

    async fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, IdentityError> {
        let response = request
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(parse_error_body(status, &text));
        }
        Ok(text)
    }

    async fn fetch_user(&self, access_token: &str) -> Result<User, IdentityError> {
        let url = self.endpoint("/user");
        let text = self.send(self.request(Method::GET, &url, Some(access_token))).await?;
        parse_json(&text)
    }

    /// Drop a session the service no longer honors.
    async fn expire_session(&self) {
        info!("session expired");
        self.clear_session().await;
    }

    async fn clear_session(&self) {
        *self.session.write().await = None;
        self.emit(AuthChangeEvent::SignedOut, None);
    }

    async fn store_session(&self, session: &Session, kind: AuthChangeEvent) {
        *self.session.write().await = Some(session.clone());
        self.emit(kind, Some(session.clone()));
    }

    fn emit(&self, kind: AuthChangeEvent, session: Option<Session>) {
        // Err only means nobody is subscribed.
        let _ = self.events.send(AuthEvent::new(kind, session));
    }
}

#[async_trait::async_trait]
impl IdentityProvider for GoTrueClient {
    async fn current_user(&self) -> Result<Option<User>, IdentityError> {
        let Some(token) = self.access_token().await else {
            return Ok(None);
        };
        match self.fetch_user(&token).await {
            Err(IdentityError::Api { status: 401 | 403, .. }) => {}
            other => return other.map(Some),
        }

        debug!("access token rejected; refreshing session");
        let session = match self.refresh_session().await {
            Ok(session) => session,
            Err(e) if e.is_rejection() || matches!(e, IdentityError::NoSession) => {
                self.expire_session().await;
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        match self.fetch_user(&session.access_token).await {
            Err(IdentityError::Api { status: 401 | 403, .. }) => {
                self.expire_session().await;
                Ok(None)
            }
            other => other.map(Some),
        }
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError> {
        let url = format!("{}?grant_type=password", self.endpoint("/token"));
        let text = self.send(self.request(Method::POST, &url, None).json(credentials)).await?;
        let session: Session = parse_json(&text)?;

        info!(user_id = %session.user.id, "signed in");
        self.store_session(&session, AuthChangeEvent::SignedIn).await;
        Ok(AuthResponse::from(session))
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError> {
        let url = self.endpoint("/signup");
        let text = self.send(self.request(Method::POST, &url, None).json(credentials)).await?;
        let response = parse_sign_up(&text)?;

        if let Some(session) = &response.session {
            info!(user_id = %session.user.id, "signed up");
            self.store_session(session, AuthChangeEvent::SignedIn).await;
        } else {
            info!(email = %credentials.email, "sign-up pending confirmation");
        }
        Ok(response)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if let Some(token) = self.access_token().await {
            let url = self.endpoint("/logout");
            match self.send(self.request(Method::POST, &url, Some(&token))).await {
                Ok(_) | Err(IdentityError::Api { status: 401 | 404, .. }) => {}
                Err(e) => return Err(e),
            }
        }

        info!("signed out");
        self.clear_session().await;
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<User, IdentityError> {
        let token = self.access_token().await.ok_or(IdentityError::NoSession)?;
        let url = self.endpoint("/user");
        let body = PasswordUpdate { password: new_password };
        let text = self
            .send(self.request(Method::PUT, &url, Some(&token)).json(&body))
            .await?;
        let user: User = parse_json(&text)?;

        let session = {
            let mut guard = self.session.write().await;
            if let Some(session) = guard.as_mut() {
                session.user = user.clone();
            }
            guard.clone()
        };
        info!(user_id = %user.id, "password updated");
        self.emit(AuthChangeEvent::UserUpdated, session);
        Ok(user)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct PasswordUpdate<'a> {
    password: &'a str,
}

/// Sign-up answers with a full session when auto-confirm is on, otherwise
/// with the bare user awaiting confirmation.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpBody {
    Session(Session),
    User(User),
}

/// GoTrue has used several error shapes across versions; accept all of them.
#[derive(Deserialize, Default)]
struct ErrorBody {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    error: Option<String>,
    error_code: Option<String>,
}

fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, IdentityError> {
    serde_json::from_str(text).map_err(|e| IdentityError::Parse(e.to_string()))
}

pub(crate) fn parse_sign_up(text: &str) -> Result<AuthResponse, IdentityError> {
    Ok(match parse_json::<SignUpBody>(text)? {
        SignUpBody::Session(session) => AuthResponse::from(session),
        SignUpBody::User(user) => AuthResponse { user: Some(user), session: None },
    })
}

pub(crate) fn parse_error_body(status: u16, text: &str) -> IdentityError {
    let body: ErrorBody = serde_json::from_str(text).unwrap_or_default();
    let code = body.error_code.or_else(|| body.error.clone());
    let message = body
        .msg
        .or(body.error_description)
        .or(body.message)
        .or(body.error)
        .unwrap_or_else(|| {
            let trimmed = text.trim();
            if trimmed.is_empty() { format!("HTTP {status}") } else { trimmed.to_owned() }
        });
    IdentityError::Api { status, code, message }
}
