//! Authentication session state and route gating for single-page clients
//! backed by a GoTrue-compatible identity service.

pub mod config;
pub mod net;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::{ConfigError, IdentityConfig};
pub use net::{GoTrueClient, IdentityError, IdentityProvider};
pub use router::{AuthGuard, GuardPaths, Navigation, NavigationDecision, Router, RouterError};
pub use state::{AuthState, AuthStore};
