//! Authentication user types.

use crate::db::UserRole;

/// Identity resolved by the authentication gate, handed to handlers by value.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User UUID from the token claim (equal to the session record)
    pub user_uuid: String,
    /// Role carried in the token claim
    pub role: UserRole,
    /// The presented token, needed to end this session on logout
    pub token: String,
}
