//! Metered feature endpoint integration tests
//!
//! Tests for `POST /v1/features/{feature}`:
//! - Free users get the daily limit per feature, then 429
//! - Active pro users are never throttled
//! - Failed upstream calls do not consume quota
//! - Missing or invalid sessions are rejected before metering

use axum::http::StatusCode;
use serde_json::Value;

use crate::common::{constants::*, test_data, TestApp};

const FEATURE: &str = "lab_translator";
const FEATURE_PATH: &str = "/v1/features/lab_translator";

#[tokio::test]
async fn test_free_user_is_limited_after_three_calls() {
    let app = TestApp::new().await;
    app.upstream
        .mock_feature_success(FEATURE, test_data::lab_translation_response())
        .await;

    for expected_remaining in ["2", "1", "0"] {
        let response = app
            .authed_post(FREE_TOKEN, FEATURE_PATH)
            .json(&test_data::lab_translation_request())
            .await;

        response.assert_status_ok();
        assert_eq!(response.header("x-ratelimit-limit"), "3");
        assert_eq!(response.header("x-ratelimit-remaining"), expected_remaining);
    }

    let response = app
        .authed_post(FREE_TOKEN, FEATURE_PATH)
        .json(&test_data::lab_translation_request())
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get("retry-after").is_some());

    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "QUOTA_EXCEEDED");
    assert_eq!(json["error"]["details"]["limit"], 3);
    assert_eq!(json["error"]["details"]["used"], 3);
    assert_eq!(json["error"]["details"]["remaining"], 0);
    assert_eq!(json["error"]["details"]["isPro"], false);

    // The rejected call never reached the upstream
    assert_eq!(app.upstream.feature_requests(FEATURE).await.len(), 3);
    assert_eq!(app.store.event_count(), 3);
}

#[tokio::test]
async fn test_features_are_metered_independently() {
    let app = TestApp::new().await;
    app.upstream
        .mock_feature_success(FEATURE, test_data::lab_translation_response())
        .await;
    app.upstream
        .mock_feature_success("comparison_insights", serde_json::json!({"insight": "stable"}))
        .await;

    for _ in 0..3 {
        app.authed_post(FREE_TOKEN, FEATURE_PATH)
            .json(&test_data::lab_translation_request())
            .await
            .assert_status_ok();
    }

    let response = app
        .authed_post(FREE_TOKEN, "/v1/features/comparison_insights")
        .json(&serde_json::json!({}))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("x-ratelimit-remaining"), "2");
}

#[tokio::test]
async fn test_pro_user_is_unlimited() {
    let app = TestApp::new().await;
    app.upstream
        .mock_feature_success(FEATURE, test_data::lab_translation_response())
        .await;

    for _ in 0..10 {
        let response = app
            .authed_post(PRO_TOKEN, FEATURE_PATH)
            .json(&test_data::lab_translation_request())
            .await;

        response.assert_status_ok();
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }

    assert_eq!(app.upstream.feature_requests(FEATURE).await.len(), 10);
    // Pro calls are still recorded for analytics
    assert_eq!(app.store.event_count(), 10);
}

#[tokio::test]
async fn test_expired_pro_user_is_capped() {
    let app = TestApp::new().await;
    app.upstream
        .mock_feature_success(FEATURE, test_data::lab_translation_response())
        .await;

    for _ in 0..3 {
        app.authed_post(EXPIRED_TOKEN, FEATURE_PATH)
            .json(&test_data::lab_translation_request())
            .await
            .assert_status_ok();
    }

    app.authed_post(EXPIRED_TOKEN, FEATURE_PATH)
        .json(&test_data::lab_translation_request())
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_upstream_failure_does_not_consume_quota() {
    let app = TestApp::new().await;
    app.upstream.mock_feature_failure(FEATURE, 500).await;

    for _ in 0..5 {
        app.authed_post(FREE_TOKEN, FEATURE_PATH)
            .json(&test_data::lab_translation_request())
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    assert_eq!(app.store.event_count(), 0);

    let json: Value = app
        .authed_get(FREE_TOKEN, "/v1/usage/lab_translator")
        .await
        .json();
    assert_eq!(json["allowed"], true);
    assert_eq!(json["remaining"], 3);
}

#[tokio::test]
async fn test_invalid_body_does_not_consume_quota() {
    let app = TestApp::new().await;

    let response = app
        .authed_post(FREE_TOKEN, FEATURE_PATH)
        .text("not json")
        .await;

    assert!(response.status_code().is_client_error());
    assert_eq!(app.store.event_count(), 0);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .server
        .post(FEATURE_PATH)
        .json(&test_data::lab_translation_request())
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.calls(), 0);
}

#[tokio::test]
async fn test_invalid_token_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .authed_post("not-a-session", FEATURE_PATH)
        .json(&test_data::lab_translation_request())
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let json: Value = response.json();
    assert_eq!(json["error"]["code"], "INVALID_TOKEN");
    assert_eq!(app.store.calls(), 0);
}

#[tokio::test]
async fn test_invalid_feature_key_is_rejected() {
    let app = TestApp::new().await;

    app.authed_post(FREE_TOKEN, "/v1/features/Lab%20Translator")
        .json(&test_data::lab_translation_request())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert_eq!(app.store.event_count(), 0);
}

#[tokio::test]
async fn test_storage_outage_fails_closed() {
    let app = TestApp::new().await;
    app.upstream
        .mock_feature_success(FEATURE, test_data::lab_translation_response())
        .await;
    app.store.set_unavailable(true);

    let response = app
        .authed_post(FREE_TOKEN, FEATURE_PATH)
        .json(&test_data::lab_translation_request())
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert!(app.upstream.feature_requests(FEATURE).await.is_empty());
}

#[tokio::test]
async fn test_custom_daily_limit() {
    let app = TestApp::build(|config| config.daily_free_limit = 1).await;
    app.upstream
        .mock_feature_success(FEATURE, test_data::lab_translation_response())
        .await;

    app.authed_post(FREE_TOKEN, FEATURE_PATH)
        .json(&test_data::lab_translation_request())
        .await
        .assert_status_ok();

    app.authed_post(FREE_TOKEN, FEATURE_PATH)
        .json(&test_data::lab_translation_request())
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_stats_summary_names_cannot_be_metered() {
    let app = TestApp::new().await;

    for path in ["/v1/features/total", "/v1/features/remaining"] {
        app.authed_post(FREE_TOKEN, path)
            .json(&test_data::lab_translation_request())
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    assert_eq!(app.store.event_count(), 0);
}
