pub mod auth;

pub use auth::{AuthState, AuthStore};
