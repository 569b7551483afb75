#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tower::ServiceExt;

use chat_server::api::{create_router, AppState, RateLimiter};
use chat_server::config::Config;
use chat_server::db;
use chat_server::hub::Hub;
use chat_server::storage::MemoryObjectStore;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryObjectStore>,
}

pub fn test_config() -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        database_url: "sqlite::memory:".to_string(),
        session_expiry_hours: 1,
        db_max_connections: 1,
        db_min_connections: 1,
        request_timeout_secs: 10,
        client_url: "http://localhost:5173".to_string(),
        storage_dir: "unused".to_string(),
        public_url: "http://localhost".to_string(),
        max_upload_bytes: 1024,
        rate_limit_per_minute: 10_000,
    }
}

/// One in-memory database per test; a single pooled connection keeps it alive.
pub async fn test_pool() -> Pool<Sqlite> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("memory url")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("open sqlite");

    db::migrate(&pool).await.expect("migrate");
    pool
}

pub async fn spawn_app() -> TestApp {
    let pool = test_pool().await;
    let config = Arc::new(test_config());
    let store = Arc::new(MemoryObjectStore::new());
    let state = AppState::new(pool, config.clone(), store.clone(), Hub::new());

    let limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute, 60));
    let router = create_router(state.clone(), limiter, None);

    TestApp { router, state, store }
}

impl TestApp {
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
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("router call");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Creates an account and returns (user id, session token).
    pub async fn signup(&self, username: &str) -> (i64, String) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/signup",
                None,
                Some(serde_json::json!({ "username": username, "password": "password123" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "signup failed: {}", body);

        let id = body["user"]["id"].as_i64().expect("user id");
        let token = body["sessionToken"].as_str().expect("token").to_string();
        (id, token)
    }

    pub async fn befriend(&self, a: (i64, &str), b: (i64, &str)) {
        for ((from, token), to) in [(a, b.0), (b, a.0)] {
            let (status, body) = self
                .request(
                    Method::POST,
                    "/api/friend-requests",
                    Some(token),
                    Some(serde_json::json!({ "userId": from, "requestedUserId": to })),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "friend request failed: {}", body);
        }
    }

    pub async fn create_group(&self, creator: i64, token: &str, name: &str) -> i64 {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/groups",
                Some(token),
                Some(serde_json::json!({ "userId": creator, "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "group creation failed: {}", body);
        body["group"]["id"].as_i64().expect("group id")
    }
}

/// multipart/form-data body with one part per (field, file name, bytes).
pub fn multipart_request(
    method: Method,
    uri: &str,
    token: &str,
    parts: &[(&str, &str, &[u8])],
) -> Request<Body> {
    let boundary = "chat-test-boundary";
    let mut body: Vec<u8> = Vec::new();
    for (field, file_name, bytes) in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .expect("build multipart request")
}
