//! Common test utilities for MeritSim integration tests
//!
//! This file contains the shared test application setup and helpers for
//! registering learners and sending authenticated JSON requests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use meritsim::{
    auth::TokenKeys,
    create_app,
    db::{init_pool, DbPool},
    explain::DisabledProvider,
    progression::DEFAULT_UNLOCK_THRESHOLD,
    run_migrations, AppState,
};
use serde_json::{json, Value};
use tower::Service;

/// A router together with the pool it writes to
pub struct TestApp {
    pub router: Router,
    pub pool: Arc<DbPool>,
}

/// Creates a test application over a fresh in-memory SQLite database
///
/// The shared-cache URI makes every pooled connection see the same
/// database while keeping tests isolated from each other.
pub fn create_test_app() -> TestApp {
    let url = format!("file:it_{}?mode=memory&cache=shared", uuid::Uuid::new_v4());
    let pool = Arc::new(init_pool(&url).unwrap());

    let conn = &mut pool.get().unwrap();
    run_migrations(conn).unwrap();

    let state = AppState {
        pool: pool.clone(),
        tokens: Arc::new(TokenKeys::new("integration-secret", 30)),
        explainer: Arc::new(DisabledProvider),
        unlock_threshold: DEFAULT_UNLOCK_THRESHOLD,
        enforce_time_limits: false,
        materials_path: PathBuf::from("materials"),
    };

    TestApp {
        router: create_app(state),
        pool,
    }
}

/// Sends a request and returns the status with the parsed JSON body
///
/// ### Arguments
///
/// * `app` - The test application
/// * `method` - HTTP method
/// * `uri` - Path and query string
/// * `token` - Bearer token, if the route needs one
/// * `body` - JSON body, if any
pub async fn send(
    app: &mut TestApp,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.call(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Registers a learner through the API and returns their access token
pub async fn register_and_login(app: &mut TestApp, email: &str) -> String {
    let (status, _) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "email": email, "password": "secreto123", "full_name": "Aspirante" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": "secreto123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}
