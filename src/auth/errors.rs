//! Authentication error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why the gate rejected a request. Logged, never shown to the client.
#[derive(Debug, thiserror::Error)]
pub enum AuthFailure {
    #[error("no bearer credential")]
    NoCredential,
    #[error("malformed or tampered token")]
    MalformedOrTamperedToken,
    #[error("token expired")]
    ExpiredToken,
    #[error("no live session for token")]
    SessionAbsent,
    #[error("session identity does not match token claim")]
    SessionIdentityMismatch,
    #[error("session store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),
}

impl AuthFailure {
    /// Log the rejection at a level matching how suspicious it is.
    pub(super) fn log(&self) {
        match self {
            Self::NoCredential
            | Self::MalformedOrTamperedToken
            | Self::ExpiredToken
            | Self::SessionAbsent => tracing::debug!(reason = %self, "Rejected request"),
            Self::SessionIdentityMismatch => tracing::warn!(reason = %self, "Rejected request"),
            Self::StoreUnavailable(_) => tracing::error!(reason = %self, "Rejected request"),
        }
    }
}

/// API authentication errors.
///
/// Every gate failure maps to the same 401 body so callers cannot probe
/// which check a token failed.
#[derive(Debug)]
pub enum ApiAuthError {
    Rejected(AuthFailure),
    InsufficientRole,
}

impl From<AuthFailure> for ApiAuthError {
    fn from(failure: AuthFailure) -> Self {
        Self::Rejected(failure)
    }
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        match self {
            Self::Rejected(_) => {
                let mut response = (
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        error: "Unauthorized",
                    }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                response
            }
            Self::InsufficientRole => (
                StatusCode::FORBIDDEN,
                Json(ErrorResponse {
                    error: "Insufficient permissions",
                }),
            )
                .into_response(),
        }
    }
}
