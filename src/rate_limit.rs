//! Rate limiting for the credential endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and signup spam.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::net::{IpAddr, SocketAddr};
use std::{num::NonZeroU32, sync::Arc};

const LOGIN_PER_SECOND: NonZeroU32 = NonZeroU32::new(1).unwrap();
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();
const REGISTER_PER_MINUTE: NonZeroU32 = NonZeroU32::new(3).unwrap();
const PERMISSIVE_PER_SECOND: NonZeroU32 = NonZeroU32::new(1_000_000).unwrap();

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Rate limiting configuration for the register and login endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Per-IP limiter for login (1 per second, bursts of 5)
    pub login: Arc<IpLimiter>,
    /// Per-IP limiter for registration (3 per minute)
    pub register: Arc<IpLimiter>,
}

impl RateLimitConfig {
    /// Create rate limiters with the production defaults.
    pub fn new() -> Self {
        Self::with_quotas(
            Quota::per_second(LOGIN_PER_SECOND).allow_burst(LOGIN_BURST),
            Quota::per_minute(REGISTER_PER_MINUTE),
        )
    }

    /// Create rate limiters with custom quotas.
    pub fn with_quotas(login: Quota, register: Quota) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(login)),
            register: Arc::new(RateLimiter::keyed(register)),
        }
    }

    /// Limits high enough that tests never hit them.
    pub fn permissive() -> Self {
        let quota = Quota::per_second(PERMISSIVE_PER_SECOND);
        Self::with_quotas(quota, quota)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Client IP from the connection info.
fn client_ip(request: &Request) -> Option<IpAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
}

async fn check(
    limiter: &IpLimiter,
    request: Request,
    next: Next,
    message: &'static str,
) -> Response {
    let Some(ip) = client_ip(&request) else {
        return (StatusCode::FORBIDDEN, "Unable to determine client IP.").into_response();
    };

    match limiter.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::info!(ip = %ip, "Rate limit exceeded");
            (StatusCode::TOO_MANY_REQUESTS, message).into_response()
        }
    }
}

/// Middleware for rate limiting login.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &config.login,
        request,
        next,
        "Too many login attempts. Please wait before trying again.",
    )
    .await
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    check(
        &config.register,
        request,
        next,
        "Too many signup attempts. Please wait before trying again.",
    )
    .await
}
