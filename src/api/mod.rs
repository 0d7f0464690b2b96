mod admin;
mod error;
mod health;
mod users;

use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::db::Database;
use crate::jwt::JwtConfig;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;
pub use health::health;
pub use users::UsersState;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    jwt: Arc<JwtConfig>,
    token_ttl: Duration,
    session_ttl: Duration,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let admin_state = admin::AdminState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let users_state = users::UsersState {
        db,
        jwt,
        token_ttl,
        session_ttl,
        rate_limit_config,
    };

    Router::new()
        .nest("/users", users::router(users_state))
        .nest("/admin", admin::router(admin_state))
}
