//! Shared harness for router-level tests: an in-memory database behind the
//! real router, driven with `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use rewear_api::auth::{AppState, AppStateInner};
use rewear_api::dispatcher::Dispatcher;
use rewear_api::routes::router;
use rewear_db::Database;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "correct horse";

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().expect("in-memory database"),
            jwt_secret: "test-secret".into(),
            token_ttl_days: 7,
            admin_emails: vec![ADMIN_EMAIL.into()],
            dispatcher: Dispatcher::new(),
        });
        let router = router(state.clone());
        Self { state, router }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), body).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Creates an account and returns its token and user JSON.
    pub async fn signup(&self, name: &str, email: &str) -> (String, Value) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(json!({ "name": name, "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);
        let token = body["token"].as_str().unwrap().to_string();
        (token, body["user"].clone())
    }

    pub async fn admin(&self) -> String {
        self.signup("Admin", ADMIN_EMAIL).await.0
    }

    /// Lists an item as `owner` and returns its id, still pending approval.
    pub async fn list_item(&self, owner: &str, title: &str, points: i64) -> String {
        let (status, body) = self.post("/api/items", owner, item_body(title, points)).await;
        assert_eq!(status, StatusCode::CREATED, "create item failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Lists and approves an item so it can be swapped.
    pub async fn live_item(&self, owner: &str, admin: &str, title: &str, points: i64) -> String {
        let id = self.list_item(owner, title, points).await;
        let (status, body) = self
            .put(&format!("/api/admin/items/{}/approve", id), admin, None)
            .await;
        assert_eq!(status, StatusCode::OK, "approve failed: {}", body);
        id
    }
}

pub fn item_body(title: &str, points: i64) -> Value {
    json!({
        "title": title,
        "description": "Gently worn and freshly laundered",
        "category": "Tops",
        "size": "M",
        "condition": "Good",
        "brand": "Acme",
        "tags": ["Cotton", "casual"],
        "points_required": points,
        "images": [{ "url": "https://img.example.com/a.jpg", "public_id": "rewear/a" }]
    })
}
