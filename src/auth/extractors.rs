//! Axum extractors for authentication.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

use super::bearer::bearer_token;
use super::errors::{ApiAuthError, AuthFailure};
use super::state::HasAuthBackend;
use super::types::AuthContext;
use crate::db::UserRole;
use crate::jwt::JwtError;

/// Run the gate: bearer token, signature and expiry, then the session record.
///
/// The signature check runs first so forged or expired tokens are rejected
/// without touching the store.
pub async fn authenticate_request<S>(
    headers: &HeaderMap,
    state: &S,
) -> Result<AuthContext, AuthFailure>
where
    S: HasAuthBackend + Send + Sync,
{
    let token = bearer_token(headers).ok_or(AuthFailure::NoCredential)?;

    let claims = state.jwt().verify(token).map_err(|e| match e {
        JwtError::Expired => AuthFailure::ExpiredToken,
        _ => AuthFailure::MalformedOrTamperedToken,
    })?;

    let session_user = state
        .db()
        .sessions()
        .get(token)
        .await
        .map_err(AuthFailure::StoreUnavailable)?
        .ok_or(AuthFailure::SessionAbsent)?;

    if session_user != claims.sub {
        return Err(AuthFailure::SessionIdentityMismatch);
    }

    Ok(AuthContext {
        user_uuid: claims.sub,
        role: claims.role,
        token: token.to_string(),
    })
}

/// Which roles an `Auth` extractor admits.
pub trait RoleConstraint {
    fn allows(role: UserRole) -> bool;
}

/// Any authenticated user.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_role: UserRole) -> bool {
        true
    }
}

/// Admins only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(role: UserRole) -> bool {
        role == UserRole::Admin
    }
}

/// Extractor for API endpoints that require authentication.
///
/// Use `Auth` for any authenticated user or `Auth<AdminOnly>` to restrict by role.
/// Gate failures answer 401; a valid session with the wrong role answers 403.
pub struct Auth<R = AnyRole> {
    pub user: AuthContext,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticate_request(&parts.headers, state)
            .await
            .inspect_err(AuthFailure::log)?;

        if !R::allows(user.role) {
            tracing::debug!(user = %user.user_uuid, role = user.role.as_str(), "Role not allowed");
            return Err(ApiAuthError::InsufficientRole);
        }

        Ok(Auth {
            user,
            _role: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::jwt::JwtConfig;
    use axum::http::{HeaderValue, header};
    use std::sync::Arc;
    use std::time::Duration;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    struct TestState {
        db: Database,
        jwt: Arc<JwtConfig>,
    }

    crate::impl_has_auth_backend!(TestState);

    async fn state() -> TestState {
        TestState {
            db: Database::open(":memory:").await.unwrap(),
            jwt: Arc::new(JwtConfig::new(b"test-secret-key-for-testing")),
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_admits_live_session() {
        let state = state().await;
        let issued = state.jwt.issue("uuid-1", UserRole::User, DAY).unwrap();
        state.db.sessions().put(&issued.token, "uuid-1", DAY).await.unwrap();

        let ctx = authenticate_request(&bearer(&issued.token), &state)
            .await
            .unwrap();

        assert_eq!(ctx.user_uuid, "uuid-1");
        assert_eq!(ctx.role, UserRole::User);
        assert_eq!(ctx.token, issued.token);
    }

    #[tokio::test]
    async fn test_no_credential() {
        let state = state().await;

        let result = authenticate_request(&HeaderMap::new(), &state).await;
        assert!(matches!(result, Err(AuthFailure::NoCredential)));
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let state = state().await;

        let result = authenticate_request(&bearer("not.a.token"), &state).await;
        assert!(matches!(result, Err(AuthFailure::MalformedOrTamperedToken)));
    }

    #[tokio::test]
    async fn test_expired_token_with_live_session() {
        let state = state().await;
        let issued = state
            .jwt
            .issue("uuid-1", UserRole::User, Duration::ZERO)
            .unwrap();
        state.db.sessions().put(&issued.token, "uuid-1", DAY).await.unwrap();

        // exp == now is still valid; wait until the clock moves past it
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let result = authenticate_request(&bearer(&issued.token), &state).await;
        assert!(matches!(result, Err(AuthFailure::ExpiredToken)));
    }

    #[tokio::test]
    async fn test_valid_token_without_session() {
        let state = state().await;
        let issued = state.jwt.issue("uuid-1", UserRole::User, DAY).unwrap();

        let result = authenticate_request(&bearer(&issued.token), &state).await;
        assert!(matches!(result, Err(AuthFailure::SessionAbsent)));
    }

    #[tokio::test]
    async fn test_session_identity_mismatch() {
        let state = state().await;
        let issued = state.jwt.issue("uuid-1", UserRole::User, DAY).unwrap();
        state.db.sessions().put(&issued.token, "uuid-2", DAY).await.unwrap();

        let result = authenticate_request(&bearer(&issued.token), &state).await;
        assert!(matches!(result, Err(AuthFailure::SessionIdentityMismatch)));
    }

    #[tokio::test]
    async fn test_store_unavailable_fails_closed() {
        let state = state().await;
        let issued = state.jwt.issue("uuid-1", UserRole::User, DAY).unwrap();
        state.db.sessions().put(&issued.token, "uuid-1", DAY).await.unwrap();
        state.db.close().await;

        let result = authenticate_request(&bearer(&issued.token), &state).await;
        assert!(matches!(result, Err(AuthFailure::StoreUnavailable(_))));
    }

    #[test]
    fn test_role_constraints() {
        assert!(AnyRole::allows(UserRole::User));
        assert!(AnyRole::allows(UserRole::Admin));
        assert!(!AdminOnly::allows(UserRole::User));
        assert!(AdminOnly::allows(UserRole::Admin));
    }
}
