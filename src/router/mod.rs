//! Client-side navigation: route table, auth guard, and the driver that
//! applies guard redirects.
//!
//! ARCHITECTURE
//! ============
//! `Router::push` resolves a location, asks the guard, and follows redirects
//! until a navigation is allowed. Each hop re-runs the guard, so a redirect
//! target is held to the same policy as the original location.
//!
//! TRADE-OFFS
//! ==========
//! Concurrent pushes are not serialized against each other; the last one to
//! finish becomes `current`.

pub mod guard;
pub mod routes;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::sync::Mutex;

use tracing::debug;

pub use guard::{AuthGuard, GuardPaths, NavigationDecision};
pub use routes::{ResolvedRoute, RouteMeta, RouteRecord, RouteTable};

/// Upper bound on guard redirects followed by a single push.
pub const MAX_REDIRECTS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("invalid route path '{0}'")]
    InvalidPath(String),
    #[error("duplicate route name '{0}'")]
    DuplicateName(String),
    #[error("no route named '{0}'")]
    UnknownName(String),
    #[error("route '{route}' needs param '{param}'")]
    MissingParam { route: String, param: String },
    #[error("navigation to '{from}' exceeded {MAX_REDIRECTS} redirects")]
    RedirectLimit { from: String },
}

/// A committed navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub route: ResolvedRoute,
    /// Location originally requested, when the guard redirected.
    pub redirected_from: Option<String>,
}

pub struct Router {
    routes: RouteTable,
    guard: AuthGuard,
    current: Mutex<Option<ResolvedRoute>>,
}

impl Router {
    #[must_use]
    pub fn new(routes: RouteTable, guard: AuthGuard) -> Self {
        Self { routes, guard, current: Mutex::new(None) }
    }

    /// Last committed route, `None` before the first navigation.
    #[must_use]
    pub fn current(&self) -> Option<ResolvedRoute> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Navigate to `location`, following guard redirects.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::RedirectLimit`] when redirects do not settle.
    pub async fn push(&self, location: &str) -> Result<Navigation, RouterError> {
        let from = self.current();
        let mut target = location.to_owned();
        let mut redirected = false;

        for _ in 0..=MAX_REDIRECTS {
            let to = self.routes.resolve(&target);
            let mut decision = NavigationDecision::Proceed;
            self.guard
                .before_each(&to, from.as_ref(), |d| decision = d)
                .await;

            let Some(redirect) = self.guard.redirect_target(decision) else {
                *self
                    .current
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(to.clone());
                debug!(to = %to.path, redirected, "navigation committed");
                let redirected_from = redirected.then(|| location.to_owned());
                return Ok(Navigation { route: to, redirected_from });
            };
            target = redirect.to_owned();
            redirected = true;
        }

        Err(RouterError::RedirectLimit { from: location.to_owned() })
    }

    /// Navigate to a named route.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownName`] / [`RouterError::MissingParam`]
    /// for a bad name, or any error from [`Router::push`].
    pub async fn push_named(&self, name: &str, params: &BTreeMap<String, String>) -> Result<Navigation, RouterError> {
        let location = self.routes.path_for(name, params)?;
        self.push(&location).await
    }
}
