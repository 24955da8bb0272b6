//! Health endpoint integration tests
//!
//! Tests for the health check endpoints:
//! - GET /health - Full health check with dependency status
//! - GET /health/ready - Readiness probe
//! - GET /health/live - Liveness probe
//! - GET /metrics - Prometheus exposition

use axum::http::StatusCode;
use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_endpoint_returns_proper_structure() {
    let app = TestApp::new().await;

    let response = app.server.get("/health").await;
    response.assert_status_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["daily_free_limit"], 3);
    assert!(json["uptime_seconds"].is_u64());
    assert!(json["timestamp"].is_string());
    assert_eq!(json["checks"]["subscriptions"]["backend"], "memory");
    assert_eq!(json["checks"]["subscriptions"]["status"], "healthy");
    assert_eq!(json["checks"]["usage"]["status"], "healthy");
}

#[tokio::test]
async fn test_health_reports_store_failure() {
    let app = TestApp::new().await;
    app.store.set_unavailable(true);

    let response = app.server.get("/health").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let json: Value = response.json();
    assert_eq!(json["status"], "unhealthy");
    assert!(json["checks"]["usage"]["error"].is_string());
}

#[tokio::test]
async fn test_readiness_follows_stores() {
    let app = TestApp::new().await;

    app.server.get("/health/ready").await.assert_status_ok();

    app.store.set_unavailable(true);
    app.server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_liveness_ignores_stores() {
    let app = TestApp::new().await;
    app.store.set_unavailable(true);

    let response = app.server.get("/health/live").await;
    response.assert_status_ok();

    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_health_endpoints_need_no_auth() {
    let app = TestApp::new().await;

    app.server.get("/health").await.assert_status_ok();
    app.server.get("/health/live").await.assert_status_ok();
    app.server.get("/metrics").await.assert_status_ok();
}
