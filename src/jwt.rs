//! Session token issuance and verification.
//!
//! Tokens are HS256 JWTs carrying the user's UUID and role. A token on its
//! own only proves that the server signed it at some point; whether it is
//! still usable is decided together with the session store.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::clock::unix_now;
use crate::db::UserRole;

/// Default token lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Claims embedded in a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// JWT ID, keeps two tokens minted in the same second distinct
    pub jti: String,
    /// Subject (user UUID)
    pub sub: String,
    /// User role at the time of issuance
    pub role: UserRole,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of issuing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

/// Signing and verification keys derived from the server secret.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a token asserting `user_uuid` that expires `ttl` from now.
    pub fn issue(
        &self,
        user_uuid: &str,
        role: UserRole,
        ttl: Duration,
    ) -> Result<IssuedToken, JwtError> {
        let now = unix_now();
        let exp = now
            .checked_add(ttl.as_secs())
            .ok_or(JwtError::TtlOutOfRange)?;

        let claims = SessionClaims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: user_uuid.to_string(),
            role,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
        })
    }

    /// Check the signature and expiry of a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Malformed(e),
            })
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Token has expired")]
    Expired,
    #[error("Malformed or tampered token: {0}")]
    Malformed(jsonwebtoken::errors::Error),
    #[error("Token lifetime overflows the expiry timestamp")]
    TtlOutOfRange,
}
