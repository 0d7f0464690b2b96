//! Server-side session records for token revocation.
//!
//! A record maps a token string to the UUID of the user it authenticates.
//! Records carry their own expiry, independent of the token's `exp` claim;
//! expired rows are invisible to reads and are swept by the cleanup task.

use sqlx::sqlite::SqlitePool;
use std::time::Duration;

use crate::clock::unix_now;

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Store for live session records.
#[derive(Clone)]
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record that `token` authenticates `user_uuid` for the next `ttl`.
    /// Overwrites any existing record for the same token.
    pub async fn put(
        &self,
        token: &str,
        user_uuid: &str,
        ttl: Duration,
    ) -> Result<(), sqlx::Error> {
        let expires_at = expires_at(ttl)?;

        sqlx::query(
            "INSERT INTO sessions (token, user_uuid, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(token) DO UPDATE SET
                user_uuid = excluded.user_uuid,
                expires_at = excluded.expires_at,
                created_at = datetime('now')",
        )
        .bind(token)
        .bind(user_uuid)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a session for `user_uuid` only if that account exists and is active.
    /// Returns false, storing nothing, when it is missing or not active.
    pub async fn put_if_active(
        &self,
        token: &str,
        user_uuid: &str,
        ttl: Duration,
    ) -> Result<bool, sqlx::Error> {
        let expires_at = expires_at(ttl)?;

        let result = sqlx::query(
            "INSERT INTO sessions (token, user_uuid, expires_at)
             SELECT ?, ?, ?
             WHERE EXISTS (SELECT 1 FROM users WHERE uuid = ? AND status = 'active')",
        )
        .bind(token)
        .bind(user_uuid)
        .bind(expires_at)
        .bind(user_uuid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Get the user UUID bound to `token`, if the record exists and has not expired.
    pub async fn get(&self, token: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT user_uuid FROM sessions WHERE token = ? AND expires_at > ?")
                .bind(token)
                .bind(now_secs())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Delete the record for `token`. Returns whether a record was removed.
    pub async fn remove(&self, token: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count live sessions of a user.
    pub async fn count_for_user(&self, user_uuid: &str) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sessions WHERE user_uuid = ? AND expires_at > ?")
                .bind(user_uuid)
                .bind(now_secs())
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    /// Delete all expired sessions.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now_secs())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn now_secs() -> i64 {
    unix_now() as i64
}

/// Expiry timestamp for a session starting now.
pub(crate) fn expires_at(ttl: Duration) -> Result<i64, sqlx::Error> {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|secs| now_secs().checked_add(secs))
        .ok_or_else(|| sqlx::Error::Configuration("session TTL out of range".into()))
}
