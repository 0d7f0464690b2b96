//! Tests for the admin endpoints.

mod common;

use accountd::db::UserRole;
use axum::http::StatusCode;
use common::{
    PASSWORD, TestApp, assert_unauthorized, create_test_app, get, login, put, register_user,
};
use serde_json::json;

/// Register an account, grant it the admin role and log in again so the
/// token carries the new role.
async fn admin_token(test: &TestApp, email: &str) -> String {
    let (_, uuid) = register_user(&test.app, email).await;
    test.db
        .users()
        .set_role(&uuid, UserRole::Admin)
        .await
        .unwrap();
    let response = login(&test.app, email, PASSWORD).await;
    response.body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_list_users_requires_admin() {
    let test = create_test_app().await;
    let (token, _) = register_user(&test.app, "alice@example.com").await;

    let response = get(&test.app, "/api/admin/users", Some(&token)).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body["error"], "Insufficient permissions");
}

#[tokio::test]
async fn test_list_users_requires_token() {
    let test = create_test_app().await;

    assert_unauthorized(&get(&test.app, "/api/admin/users", None).await);
}

#[tokio::test]
async fn test_list_users() {
    let test = create_test_app().await;
    let admin = admin_token(&test, "admin@example.com").await;
    register_user(&test.app, "alice@example.com").await;

    let response = get(&test.app, "/api/admin/users", Some(&admin)).await;

    assert_eq!(response.status, StatusCode::OK);
    let users = response.body.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["email"], "admin@example.com");
    assert_eq!(users[0]["role"], "admin");
    assert_eq!(users[1]["email"], "alice@example.com");
    assert!(users.iter().all(|u| u.get("password_hash").is_none()));
}

#[tokio::test]
async fn test_role_is_fixed_at_issue_time() {
    let test = create_test_app().await;
    let (token, uuid) = register_user(&test.app, "alice@example.com").await;
    test.db
        .users()
        .set_role(&uuid, UserRole::Admin)
        .await
        .unwrap();

    // The old token still carries the user role
    let response = get(&test.app, "/api/admin/users", Some(&token)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let token = login(&test.app, "alice@example.com", PASSWORD).await.body["token"]
        .as_str()
        .unwrap()
        .to_string();
    let response = get(&test.app, "/api/admin/users", Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_suspend_revokes_sessions_and_blocks_login() {
    let test = create_test_app().await;
    let admin = admin_token(&test, "admin@example.com").await;
    let (alice, alice_uuid) = register_user(&test.app, "alice@example.com").await;

    let response = put(
        &test.app,
        &format!("/api/admin/users/{}/status", alice_uuid),
        Some(&admin),
        json!({ "status": "suspended" }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "suspended");

    assert_unauthorized(&get(&test.app, "/api/users/profile", Some(&alice)).await);
    let response = login(&test.app, "alice@example.com", PASSWORD).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reactivate_allows_login() {
    let test = create_test_app().await;
    let admin = admin_token(&test, "admin@example.com").await;
    let (_, alice_uuid) = register_user(&test.app, "alice@example.com").await;
    let uri = format!("/api/admin/users/{}/status", alice_uuid);

    put(&test.app, &uri, Some(&admin), json!({ "status": "inactive" })).await;
    let response = put(&test.app, &uri, Some(&admin), json!({ "status": "active" })).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = login(&test.app, "alice@example.com", PASSWORD).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_set_status_requires_admin() {
    let test = create_test_app().await;
    let (alice, alice_uuid) = register_user(&test.app, "alice@example.com").await;

    let response = put(
        &test.app,
        &format!("/api/admin/users/{}/status", alice_uuid),
        Some(&alice),
        json!({ "status": "suspended" }),
    )
    .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_set_status_unknown_user() {
    let test = create_test_app().await;
    let admin = admin_token(&test, "admin@example.com").await;

    let response = put(
        &test.app,
        "/api/admin/users/00000000-0000-4000-8000-000000000000/status",
        Some(&admin),
        json!({ "status": "suspended" }),
    )
    .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_set_status_invalid_input() {
    let test = create_test_app().await;
    let admin = admin_token(&test, "admin@example.com").await;
    let (_, alice_uuid) = register_user(&test.app, "alice@example.com").await;

    let response = put(
        &test.app,
        "/api/admin/users/not-a-uuid/status",
        Some(&admin),
        json!({ "status": "suspended" }),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let response = put(
        &test.app,
        &format!("/api/admin/users/{}/status", alice_uuid),
        Some(&admin),
        json!({ "status": "banished" }),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({ "error": "Invalid status data" }));
}
