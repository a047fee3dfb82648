//! Identity-service boundary: collaborator trait, DTOs, and the HTTP client.

pub mod gotrue;
pub mod identity;
pub mod types;

pub use gotrue::GoTrueClient;
pub use identity::{IdentityError, IdentityProvider};
