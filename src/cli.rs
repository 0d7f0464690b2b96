//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::{DEFAULT_SESSION_TTL, Database, UserRole};
use crate::jwt::DEFAULT_TOKEN_TTL;
use crate::rate_limit::RateLimitConfig;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Upper bound for token and session lifetimes: ten years.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "accountd",
    about = "User accounts with session-backed bearer tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "4000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "accountd.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Lifetime of issued tokens, in seconds
    #[arg(
        long,
        env = "TOKEN_TTL",
        default_value_t = DEFAULT_TOKEN_TTL.as_secs(),
        value_parser = parse_ttl
    )]
    pub token_ttl: u64,

    /// Lifetime of server-side sessions, in seconds
    #[arg(
        long,
        env = "SESSION_TTL",
        default_value_t = DEFAULT_SESSION_TTL.as_secs(),
        value_parser = parse_ttl
    )]
    pub session_ttl: u64,

    /// Grant the admin role to the account with this email on startup
    #[arg(long)]
    pub promote_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn parse_ttl(s: &str) -> Result<u64, String> {
    let secs: u64 = s
        .parse()
        .map_err(|_| format!("TTL must be a whole number of seconds: {}", s))?;
    if secs == 0 {
        return Err("TTL must be greater than zero".to_string());
    }
    if secs > MAX_TTL_SECS {
        return Err(format!("TTL cannot exceed {} seconds", MAX_TTL_SECS));
    }
    Ok(secs)
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Handle the --promote-admin flag: grant the admin role to an existing account.
/// Returns false if the promotion could not be performed.
pub async fn handle_promote_admin(db: &Database, email: &str) -> bool {
    let email = email.trim().to_lowercase();

    let user = match db.users().get_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            error!(email = %email, "No account with this email to promote");
            return false;
        }
        Err(e) => {
            error!(error = %e, "Failed to look up account to promote");
            return false;
        }
    };

    if user.role == UserRole::Admin {
        warn!(email = %email, "Account is already an admin");
        return true;
    }

    match db.users().set_role(&user.uuid, UserRole::Admin).await {
        Ok(true) => {
            info!(email = %email, uuid = %user.uuid, "Account promoted to admin");
            true
        }
        Ok(false) => {
            error!(email = %email, "Account disappeared before promotion");
            false
        }
        Err(e) => {
            error!(error = %e, "Failed to promote account");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    db: Database,
    jwt_secret: String,
    token_ttl: u64,
    session_ttl: u64,
) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        token_ttl: Duration::from_secs(token_ttl),
        session_ttl: Duration::from_secs(session_ttl),
        rate_limit_config: Arc::new(RateLimitConfig::new()),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
