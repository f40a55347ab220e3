//! Signup, login and the bearer-token middleware.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{ADMIN_EMAIL, PASSWORD, TestApp};

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
}

#[tokio::test]
async fn signup_returns_user_and_token() {
    let app = TestApp::new();
    let (token, user) = app.signup("Ada Lovelace", "Ada@Example.com").await;

    assert!(!token.is_empty());
    assert_eq!(user["email"], "ada@example.com");
    assert_eq!(user["points"], 10);
    assert_eq!(user["role"], "user");
    assert!(user.get("password_hash").is_none());

    let (status, me) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user["id"]);

    let (_, notifications) = app.get("/api/notifications", Some(&token)).await;
    assert_eq!(notifications["data"][0]["type"], "system_announcement");
}

#[tokio::test]
async fn configured_admin_emails_get_admin_role() {
    let app = TestApp::new();
    let (_, user) = app.signup("Admin", ADMIN_EMAIL).await;
    assert_eq!(user["role"], "admin");
}

#[tokio::test]
async fn signup_validates_every_field() {
    let app = TestApp::new();
    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "name": "A", "email": "nope", "password": "short" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["name", "email", "password"]);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new();
    app.signup("Ada", "ada@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(json!({ "name": "Other Ada", "email": "ADA@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User already exists");
}

#[tokio::test]
async fn login_checks_the_password() {
    let app = TestApp::new();
    app.signup("Ada", "ada@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = app.get("/api/auth/me", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tokens_of_deleted_users_stop_working() {
    let app = TestApp::new();
    let admin = app.admin().await;
    let (token, user) = app.signup("Ada", "ada@example.com").await;

    let (status, _) = app
        .delete(&format!("/api/admin/users/{}", user["id"].as_str().unwrap()), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn leaderboard_and_platform_stats_are_public() {
    let app = TestApp::new();
    app.signup("Ada", "ada@example.com").await;
    app.signup("Grace", "grace@example.com").await;

    let (status, board) = app.get("/api/auth/leaderboard?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board.as_array().unwrap().len(), 2);

    let (status, _) = app.get("/api/auth/leaderboard?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, stats) = app.get("/api/auth/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_users"], 2);
    assert_eq!(stats["total_swaps"], 0);
}

#[tokio::test]
async fn profile_updates_are_validated() {
    let app = TestApp::new();
    let (token, _) = app.signup("Ada", "ada@example.com").await;

    let (status, user) = app
        .put(
            "/api/auth/profile",
            &token,
            Some(json!({ "name": "Ada King", "location": { "city": "London", "country": "UK" } })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["name"], "Ada King");
    assert_eq!(user["location"]["city"], "London");

    let (status, body) = app
        .put("/api/users/profile", &token, Some(json!({ "avatar": "not a url" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "avatar");

    let (status, _) = app
        .put("/api/users/profile", &token, Some(json!({ "avatar": "http://:::" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_body_fields_are_rejected() {
    let app = TestApp::new();
    let (token, _) = app.signup("Ada", "ada@example.com").await;

    let (status, body) = app
        .put("/api/users/profile", &token, Some(json!({ "points": 1000 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body");
}
