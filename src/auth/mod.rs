//! Bearer token authentication backed by revocable sessions.
//!
//! A request is admitted only when its token verifies (signature, expiry)
//! and a live session record binds that exact token to the same user.
//! Deleting the record revokes the token before it expires.

mod bearer;
mod errors;
mod extractors;
mod state;
mod types;

pub use bearer::bearer_token;
pub use errors::{ApiAuthError, AuthFailure};
pub use extractors::{AdminOnly, AnyRole, Auth, RoleConstraint, authenticate_request};
pub use state::HasAuthBackend;
pub use types::AuthContext;
