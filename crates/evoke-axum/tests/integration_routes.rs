//! Integration tests for the Axum router.
//!
//! These tests verify that routes are correctly wired to handlers.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{test_config, test_context, wait_until};
use evoke_axum::bootstrap::{CorsConfig, bootstrap_with_store};
use evoke_core::{NewMessage, ResultStore, StoreError};
use evoke_axum::routes::create_router;

fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let app = create_router(test_context(&test_config()).ctx, &CorsConfig::AllowAll);

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn progress_without_run_is_not_found() {
    let app = create_router(test_context(&test_config()).ctx, &CorsConfig::AllowAll);

    let response = app.oneshot(get("/api/projects/p1/progress")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["status"], 404);
    assert!(json["error"].as_str().unwrap().contains("p1"));
}

#[tokio::test]
async fn start_run_rejects_empty_prompt() {
    let app = create_router(test_context(&test_config()).ctx, &CorsConfig::AllowAll);

    let response = app
        .oneshot(post_json(
            "/api/projects/p1/runs",
            &serde_json::json!({"prompt": "   "}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn second_run_for_same_project_conflicts() {
    let test = test_context(&test_config());
    let runs = test.runs.clone();
    let app = create_router(test.ctx, &CorsConfig::AllowAll);
    let body = serde_json::json!({"prompt": "a todo app", "stepDelayMs": 200});

    let first = app
        .clone()
        .oneshot(post_json("/api/projects/p1/runs", &body))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);
    let json = json_body(first).await;
    assert_eq!(json["projectId"], "p1");
    assert!(runs.is_active("p1"));

    let second = app
        .clone()
        .oneshot(post_json("/api/projects/p1/runs", &body))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let other = app
        .clone()
        .oneshot(post_json("/api/projects/p2/runs", &body))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::ACCEPTED);

    let progress = app.oneshot(get("/api/projects/p1/progress")).await.unwrap();
    assert_eq!(progress.status(), StatusCode::OK);
    let snapshot = json_body(progress).await;
    assert!(snapshot["steps"].is_array());
    assert!(snapshot["currentStep"].is_string());
}

struct PanickingStore;

#[async_trait]
impl ResultStore for PanickingStore {
    async fn rename_project(&self, _project_id: &str, _name: &str) -> Result<String, StoreError> {
        panic!("store exploded");
    }

    async fn save_message(
        &self,
        _project_id: &str,
        _message: NewMessage,
    ) -> Result<serde_json::Value, StoreError> {
        panic!("store exploded");
    }
}

#[tokio::test]
async fn panicking_run_releases_project() {
    let ctx = bootstrap_with_store(&test_config(), Arc::new(PanickingStore));
    let runs = ctx.runs.clone();
    let app = create_router(ctx, &CorsConfig::AllowAll);
    let body = serde_json::json!({"prompt": "a todo app", "stepDelayMs": 0});

    let first = app
        .clone()
        .oneshot(post_json("/api/projects/p1/runs", &body))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    assert!(wait_until(Duration::from_secs(2), || !runs.is_active("p1")).await);

    let again = app
        .oneshot(post_json("/api/projects/p1/runs", &body))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn connections_endpoint_counts_sinks() {
    let test = test_context(&test_config());
    let app = create_router(test.ctx, &CorsConfig::AllowAll);

    let response = app
        .oneshot(get("/api/events/p1/connections"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json, serde_json::json!({"projectId": "p1", "connections": 0}));
}

#[tokio::test]
async fn event_stream_sets_headers_and_acknowledges() {
    let test = test_context(&test_config());
    let hub = test.hub.clone();
    let app = create_router(test.ctx, &CorsConfig::AllowAll);

    let response = app.oneshot(get("/api/events/p1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-transform");
    assert_eq!(headers["x-accel-buffering"], "no");
    assert_eq!(hub.connection_count("p1"), 1);

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let bytes = frame.into_data().unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();
    assert_eq!(text, "data: {\"type\":\"connected\",\"projectId\":\"p1\"}\n\n");

    drop(body);
    assert_eq!(hub.connection_count("p1"), 0);
}
