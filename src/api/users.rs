//! Account endpoints.
//!
//! - POST `/register` - Create an account and start a session
//! - POST `/login` - Check credentials and start a session
//! - POST `/logout` - End the presented session
//! - GET/PUT/DELETE `/profile` - Read, update or delete the current account

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::error::{
    ApiError, ResultExt, is_unique_violation, json_body, validate_email, validate_name,
};
use crate::auth::Auth;
use crate::db::{Database, NewUser, ProfileUpdate, User, UserProfile, UserRole, UserStatus};
use crate::impl_has_auth_backend;
use crate::jwt::{IssuedToken, JwtConfig};
use crate::password::{hash_password, verify_password};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub token_ttl: Duration,
    pub session_ttl: Duration,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_register,
        ));

    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    let account_router = Router::new()
        .route("/logout", post(logout))
        .route(
            "/profile",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .with_state(state);

    Router::new()
        .merge(register_router)
        .merge(login_router)
        .merge(account_router)
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Serialize)]
struct SessionResponse {
    user: UserProfile,
    token: String,
    /// Token expiration (Unix seconds)
    expires_at: u64,
}

impl SessionResponse {
    fn new(user: User, issued: IssuedToken) -> Self {
        Self {
            user: user.into(),
            token: issued.token,
            expires_at: issued.expires_at,
        }
    }
}

fn issue_token(state: &UsersState, uuid: &str, role: UserRole) -> Result<IssuedToken, ApiError> {
    state.jwt.issue(uuid, role, state.token_ttl).map_err(|e| {
        error!("Failed to issue token: {}", e);
        ApiError::internal("Failed to issue token")
    })
}

/// Issue a token for `user` and record its session. The session is only
/// stored while the account is still active, so a concurrent suspension or
/// deletion cannot leave a live session behind.
async fn start_session(state: &UsersState, user: &User) -> Result<IssuedToken, ApiError> {
    let issued = issue_token(state, &user.uuid, user.role)?;

    let stored = state
        .db
        .sessions()
        .put_if_active(&issued.token, &user.uuid, state.session_ttl)
        .await
        .db_err("Failed to store session")?;
    if !stored {
        return Err(ApiError::forbidden("Account is not active"));
    }

    Ok(issued)
}

async fn register(
    State(state): State<UsersState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, "Invalid user data")?;
    let email = validate_email(&payload.email)?;
    let name = match payload.name.as_deref() {
        Some(name) => validate_name(name)?,
        None => None,
    };

    let password_len = payload.password.chars().count();
    if password_len < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    if password_len > MAX_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(
            "Password cannot be longer than 128 characters",
        ));
    }

    let existing = state
        .db
        .users()
        .get_by_email(&email)
        .await
        .db_err("Failed to check email")?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| {
            error!("Failed to hash password: {}", e);
            ApiError::internal("Failed to hash password")
        })?;

    let uuid = uuid::Uuid::new_v4().to_string();
    let issued = issue_token(&state, &uuid, UserRole::User)?;
    let created = state
        .db
        .create_user_with_session(
            &NewUser {
                uuid: &uuid,
                email: &email,
                password_hash: &password_hash,
                name: name.as_deref(),
            },
            &issued.token,
            state.session_ttl,
        )
        .await;

    match created {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Email is already registered"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    }

    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::internal("User vanished after creation"))?;

    info!(user = %user.uuid, "User registered");

    Ok((StatusCode::CREATED, Json(SessionResponse::new(user, issued))))
}

async fn login(
    State(state): State<UsersState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, "Invalid login data")?;
    let user = state
        .db
        .users()
        .get_by_email(payload.email.trim())
        .await
        .db_err("Failed to get user")?;

    let Some(user) = user else {
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    let password = payload.password;
    let password_hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| ApiError::internal(format!("Password check task failed: {}", e)))?;

    if !valid {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    if user.status != UserStatus::Active {
        return Err(ApiError::forbidden("Account is not active"));
    }

    state
        .db
        .users()
        .touch_last_login(&user.uuid)
        .await
        .db_err("Failed to record login")?;

    let issued = start_session(&state, &user).await?;

    let user = state
        .db
        .users()
        .get_by_uuid(&user.uuid)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user = %user.uuid, "User logged in");

    Ok(Json(SessionResponse::new(user, issued)))
}

/// End the session of the presented token. Other sessions stay live.
async fn logout(
    State(state): State<UsersState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .sessions()
        .remove(&auth.user.token)
        .await
        .db_err("Failed to remove session")?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_profile(
    State(state): State<UsersState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(&auth.user.user_uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserProfile::from(user)))
}

async fn update_profile(
    State(state): State<UsersState>,
    auth: Auth,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(body, "Invalid update data")?;
    let email = payload.email.as_deref().map(validate_email).transpose()?;
    // A blank name clears it
    let name = payload.name.as_deref().map(validate_name).transpose()?;

    let update = ProfileUpdate { email, name };
    let updated = match state
        .db
        .users()
        .update_profile(&auth.user.user_uuid, &update)
        .await
    {
        Ok(updated) => updated,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::conflict("Email is already registered"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to update user", e)),
    };

    if !updated {
        return Err(ApiError::not_found("User not found"));
    }

    let user = state
        .db
        .users()
        .get_by_uuid(&auth.user.user_uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserProfile::from(user)))
}

/// Delete the account and every session it holds.
async fn delete_profile(
    State(state): State<UsersState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .delete_user_and_sessions(&auth.user.user_uuid)
        .await
        .db_err("Failed to delete user")?;

    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user = %auth.user.user_uuid, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}
