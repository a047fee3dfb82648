//! Navigation guard gating routes on authentication state.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs before every navigation. The guard only reads [`AuthStore`]; the one
//! exception is the first navigation, which waits for a session check if none
//! has completed yet. A failed check has already been folded into "signed
//! out" by the store, so the guard has no failure mode of its own.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::sync::Arc;

use tracing::{debug, info};

use super::routes::{ResolvedRoute, normalize};
use crate::state::auth::AuthStore;

pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_HOME_PATH: &str = "/";

/// Outcome of one guard run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed,
    RedirectToLogin,
    RedirectToHome,
}

/// Where the guard sends redirected navigations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardPaths {
    pub login: String,
    pub home: String,
}

impl Default for GuardPaths {
    fn default() -> Self {
        Self { login: DEFAULT_LOGIN_PATH.to_owned(), home: DEFAULT_HOME_PATH.to_owned() }
    }
}

/// The decision table. Only the login path itself bounces signed-in users
/// home; other public pages stay reachable.
#[must_use]
pub fn decide(requires_auth: bool, authenticated: bool, is_login: bool) -> NavigationDecision {
    match (requires_auth, authenticated, is_login) {
        (true, false, _) => NavigationDecision::RedirectToLogin,
        (false, true, true) => NavigationDecision::RedirectToHome,
        _ => NavigationDecision::Proceed,
    }
}

pub struct AuthGuard {
    store: Arc<AuthStore>,
    paths: GuardPaths,
}

impl AuthGuard {
    /// Paths are normalized the same way resolved locations are, so
    /// `/login/` and `/login` name the same page.
    #[must_use]
    pub fn new(store: Arc<AuthStore>, paths: GuardPaths) -> Self {
        let paths = GuardPaths { login: normalize(&paths.login), home: normalize(&paths.home) };
        Self { store, paths }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<AuthStore> {
        &self.store
    }

    /// Decide whether navigation to `to` may proceed.
    pub async fn check(&self, to: &ResolvedRoute) -> NavigationDecision {
        if self.store.is_loading() {
            debug!(path = %to.path, "waiting for session check");
            self.store.refresh().await;
        }

        let decision = decide(to.requires_auth(), self.store.is_authenticated(), to.path == self.paths.login);
        if decision != NavigationDecision::Proceed {
            info!(path = %to.path, ?decision, "navigation redirected");
        }
        decision
    }

    /// Router hook: runs [`AuthGuard::check`] and hands the decision to `next`.
    pub async fn before_each<F>(&self, to: &ResolvedRoute, from: Option<&ResolvedRoute>, next: F)
    where
        F: FnOnce(NavigationDecision),
    {
        let decision = self.check(to).await;
        debug!(
            from = from.map_or("<start>", |r| r.path.as_str()),
            to = %to.path,
            ?decision,
            "guard decision"
        );
        next(decision);
    }

    /// Location a redirecting decision points at.
    #[must_use]
    pub fn redirect_target(&self, decision: NavigationDecision) -> Option<&str> {
        match decision {
            NavigationDecision::Proceed => None,
            NavigationDecision::RedirectToLogin => Some(&self.paths.login),
            NavigationDecision::RedirectToHome => Some(&self.paths.home),
        }
    }
}
