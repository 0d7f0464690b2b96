//! Admin API endpoints.
//!
//! All endpoints require admin role.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, json_body, validate_uuid};
use crate::auth::{AdminOnly, Auth};
use crate::db::{Database, UserProfile, UserStatus};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

/// State for admin endpoints.
#[derive(Clone)]
pub struct AdminState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(AdminState);

pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/{uuid}/status", put(set_status))
        .with_state(state)
}

/// List all users.
async fn list_users(
    State(state): State<AdminState>,
    _auth: Auth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users().list().await.db_err("Failed to list users")?;

    Ok(Json(users))
}

#[derive(Deserialize)]
struct SetStatusRequest {
    status: UserStatus,
}

/// Change a user's account status. Leaving `active` ends all of their sessions.
async fn set_status(
    State(state): State<AdminState>,
    auth: Auth<AdminOnly>,
    Path(uuid): Path<String>,
    body: Result<Json<SetStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&uuid)?;
    let payload = json_body(body, "Invalid status data")?;

    let revoked = state
        .db
        .set_status_and_revoke(&uuid, payload.status)
        .await
        .db_err("Failed to set status")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if payload.status != UserStatus::Active {
        info!(
            admin = %auth.user.user_uuid,
            user = %uuid,
            status = payload.status.as_str(),
            revoked,
            "Account deactivated"
        );
    }

    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserProfile::from(user)))
}
