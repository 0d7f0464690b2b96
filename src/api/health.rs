//! Liveness endpoint.

use axum::{Json, response::IntoResponse};
use serde::Serialize;

use crate::clock::{format_timestamp, unix_now};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        timestamp: format_timestamp(unix_now()),
    })
}
