//! In-memory identity provider shared by unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::broadcast;

use crate::net::identity::{IdentityError, IdentityProvider};
use crate::net::types::{AuthChangeEvent, AuthEvent, AuthResponse, Credentials, Session, User};

pub(crate) const GOOD_PASSWORD: &str = "secret";

pub(crate) fn test_user(email: &str) -> User {
    User {
        id: format!("id-{email}"),
        email: Some(email.to_owned()),
        role: Some("authenticated".into()),
        user_metadata: serde_json::Value::Null,
        created_at: None,
    }
}

pub(crate) fn test_session(user: User) -> Session {
    Session {
        access_token: "at".into(),
        refresh_token: "rt".into(),
        token_type: "bearer".into(),
        expires_in: 3600,
        expires_at: None,
        user,
    }
}

fn rejected(status: u16, message: &str) -> IdentityError {
    IdentityError::Api { status, code: None, message: message.into() }
}

/// Accepts any e-mail with [`GOOD_PASSWORD`]. Never emits events on its own;
/// tests push notifications through [`MockIdentity::emit`].
pub(crate) struct MockIdentity {
    current: Mutex<Option<User>>,
    fail_current_user: AtomicBool,
    malformed_current_user: AtomicBool,
    fail_sign_out: AtomicBool,
    current_user_calls: AtomicUsize,
    events: broadcast::Sender<AuthEvent>,
}

impl MockIdentity {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            current: Mutex::new(None),
            fail_current_user: AtomicBool::new(false),
            malformed_current_user: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            current_user_calls: AtomicUsize::new(0),
            events,
        }
    }

    /// Service-side session already active before the client starts.
    pub(crate) fn with_user(email: &str) -> Self {
        let mock = Self::new();
        *mock.current.lock().unwrap() = Some(test_user(email));
        mock
    }

    pub(crate) fn set_fail_current_user(&self, fail: bool) {
        self.fail_current_user.store(fail, Ordering::SeqCst);
    }

    /// Answer `current_user` as if the service sent an unreadable body.
    pub(crate) fn set_malformed_current_user(&self, malformed: bool) {
        self.malformed_current_user.store(malformed, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn current_user_calls(&self) -> usize {
        self.current_user_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn emit(&self, kind: AuthChangeEvent, session: Option<Session>) {
        let _ = self.events.send(AuthEvent::new(kind, session));
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockIdentity {
    async fn current_user(&self) -> Result<Option<User>, IdentityError> {
        self.current_user_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_current_user.load(Ordering::SeqCst) {
            return Err(IdentityError::Request("connection reset".into()));
        }
        if self.malformed_current_user.load(Ordering::SeqCst) {
            return Err(IdentityError::Parse("expected value at line 1 column 1".into()));
        }
        Ok(self.current.lock().unwrap().clone())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError> {
        if credentials.password != GOOD_PASSWORD {
            return Err(rejected(400, "Invalid login credentials"));
        }
        let session = test_session(test_user(&credentials.email));
        *self.current.lock().unwrap() = Some(session.user.clone());
        Ok(AuthResponse::from(session))
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<AuthResponse, IdentityError> {
        if credentials.email == "taken@b.com" {
            return Err(rejected(422, "User already registered"));
        }
        self.sign_in(credentials).await
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(rejected(500, "logout failed"));
        }
        *self.current.lock().unwrap() = None;
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<User, IdentityError> {
        let user = self.current.lock().unwrap().clone().ok_or(IdentityError::NoSession)?;
        if new_password.len() < 6 {
            return Err(rejected(422, "Password should be at least 6 characters."));
        }
        Ok(user)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
