#![allow(dead_code)]

use accountd::{ServerConfig, create_app, db::Database, jwt::JwtConfig, rate_limit::RateLimitConfig};
use axum::{
    Router,
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";
pub const PASSWORD: &str = "correct horse battery";

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// A test application plus handles to the state behind it.
pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: JwtConfig,
}

/// Response status, headers and body. Non-JSON bodies are returned as a string value.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(RateLimitConfig::permissive(), DAY, DAY).await
}

pub async fn create_test_app_with_rate_limit(rate_limit: RateLimitConfig) -> TestApp {
    create_test_app_with(rate_limit, DAY, DAY).await
}

pub async fn create_test_app_with_ttls(token_ttl: Duration, session_ttl: Duration) -> TestApp {
    create_test_app_with(RateLimitConfig::permissive(), token_ttl, session_ttl).await
}

async fn create_test_app_with(
    rate_limit: RateLimitConfig,
    token_ttl: Duration,
    session_ttl: Duration,
) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: JWT_SECRET.to_vec(),
        token_ttl,
        session_ttl,
        rate_limit_config: Arc::new(rate_limit),
    };
    TestApp {
        app: create_app(&config),
        db,
        jwt: JwtConfig::new(JWT_SECRET),
    }
}

/// Build a request as if it arrived from 127.0.0.1.
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let mut request = builder.body(body).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    request
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

/// POST a raw body with the given content type.
pub async fn post_raw(app: &Router, uri: &str, content_type: &str, body: &str) -> TestResponse {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body.to_string()))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    send(app, request).await
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> TestResponse {
    send(app, request(Method::GET, uri, token, None)).await
}

pub async fn post(app: &Router, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
    send(app, request(Method::POST, uri, token, Some(body))).await
}

pub async fn put(app: &Router, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
    send(app, request(Method::PUT, uri, token, Some(body))).await
}

pub async fn delete(app: &Router, uri: &str, token: Option<&str>) -> TestResponse {
    send(app, request(Method::DELETE, uri, token, None)).await
}

pub async fn logout(app: &Router, token: &str) -> TestResponse {
    send(app, request(Method::POST, "/api/users/logout", Some(token), None)).await
}

pub async fn register(app: &Router, email: &str, password: &str) -> TestResponse {
    post(
        app,
        "/api/users/register",
        None,
        json!({ "email": email, "password": password }),
    )
    .await
}

pub async fn login(app: &Router, email: &str, password: &str) -> TestResponse {
    post(
        app,
        "/api/users/login",
        None,
        json!({ "email": email, "password": password }),
    )
    .await
}

/// Register an account with the default password. Returns (token, user UUID).
pub async fn register_user(app: &Router, email: &str) -> (String, String) {
    let response = register(app, email, PASSWORD).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    (
        response.body["token"].as_str().unwrap().to_string(),
        response.body["user"]["id"].as_str().unwrap().to_string(),
    )
}

/// Assert the uniform gate rejection.
pub fn assert_unauthorized(response: &TestResponse) {
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, json!({ "error": "Unauthorized" }));
    assert_eq!(
        response.headers.get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
}
