mod session;
mod user;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Duration;

pub use session::{DEFAULT_SESSION_TTL, SessionStore};
pub use user::{NewUser, ProfileUpdate, User, UserProfile, UserRole, UserStatus, UserStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                "CREATE TABLE users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    email TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    name TEXT,
                    role TEXT NOT NULL DEFAULT 'user',
                    status TEXT NOT NULL DEFAULT 'active',
                    last_login TEXT,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_users_uuid ON users(uuid)",
                "CREATE INDEX idx_users_email ON users(email)",
                // Sessions keyed by the full token string
                "CREATE TABLE sessions (
                    token TEXT PRIMARY KEY NOT NULL,
                    user_uuid TEXT NOT NULL,
                    expires_at INTEGER NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_sessions_user_uuid ON sessions(user_uuid)",
                "CREATE INDEX idx_sessions_expires_at ON sessions(expires_at)",
            ],
        )
        .await
    }

    /// Get the user store.
    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    /// Get the session store.
    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.pool.clone())
    }

    /// Create a user together with its first session in one transaction.
    /// Neither row is written if either insert fails.
    pub async fn create_user_with_session(
        &self,
        user: &NewUser<'_>,
        token: &str,
        session_ttl: Duration,
    ) -> Result<(), sqlx::Error> {
        let expires_at = session::expires_at(session_ttl)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO users (uuid, email, password_hash, name) VALUES (?, ?, ?, ?)")
            .bind(user.uuid)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO sessions (token, user_uuid, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user.uuid)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Set a user's status, ending all of their sessions unless the new status
    /// is active. Returns the number of sessions ended, or `None` if the user
    /// does not exist.
    pub async fn set_status_and_revoke(
        &self,
        uuid: &str,
        status: UserStatus,
    ) -> Result<Option<u64>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE users SET status = ?, updated_at = datetime('now') WHERE uuid = ?",
        )
        .bind(status.as_str())
        .bind(uuid)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        let revoked = if status == UserStatus::Active {
            0
        } else {
            sqlx::query("DELETE FROM sessions WHERE user_uuid = ?")
                .bind(uuid)
                .execute(&mut *tx)
                .await?
                .rows_affected()
        };
        tx.commit().await?;
        Ok(Some(revoked))
    }

    /// Delete a user and all of their sessions in one transaction.
    /// Returns whether the user existed.
    pub async fn delete_user_and_sessions(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM sessions WHERE user_uuid = ?")
            .bind(uuid)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE uuid = ?")
            .bind(uuid)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Close the pool. Every store call made afterwards fails.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
