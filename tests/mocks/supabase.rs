//! Mock Supabase server for testing
//!
//! Provides wiremock-based mocks for the Supabase endpoints:
//! - GET /auth/v1/user - Session validation
//! - GET /rest/v1/profiles - Subscription lookup
//! - HEAD /rest/v1/ai_usage - Usage count (`Prefer: count=exact`)
//! - GET /rest/v1/ai_usage - Usage rows for daily stats
//! - POST /rest/v1/ai_usage - Usage insert
//! - GET /rest/v1/ - Health
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::mocks::supabase::MockSupabaseServer;
//!
//! #[tokio::test]
//! async fn test_with_supabase_mock() {
//!     let supabase = MockSupabaseServer::start().await;
//!     supabase.mock_auth_user("token-1", "user-1").await;
//!
//!     // Use supabase.uri() as SUPABASE_URL
//! }
//! ```

#![allow(dead_code)]

use serde_json::json;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

/// Service key the test configuration sends
pub const TEST_SERVICE_KEY: &str = "test-service-key";

/// Mock Supabase server wrapper
pub struct MockSupabaseServer {
    server: MockServer,
}

impl MockSupabaseServer {
    /// Start a new mock Supabase server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Get the mock server URI
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Get all received requests (for assertion in tests)
    pub async fn received_requests(&self) -> Vec<wiremock::Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Requests that reached one REST table
    pub async fn table_requests(&self, table: &str, verb: &str) -> Vec<wiremock::Request> {
        let table_path = format!("/rest/v1/{}", table);
        self.received_requests()
            .await
            .into_iter()
            .filter(|r| r.url.path() == table_path && r.method.as_str() == verb)
            .collect()
    }

    // =========================================================================
    // GET /auth/v1/user - Session validation
    // =========================================================================

    /// Accept `token` as the session of `user_id`
    pub async fn mock_auth_user(&self, token: &str, user_id: &str) {
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("Authorization", format!("Bearer {}", token).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": user_id,
                "email": format!("{}@test.com", user_id),
                "aud": "authenticated",
                "role": "authenticated"
            })))
            .mount(&self.server)
            .await;
    }

    /// Reject every session not matched by an earlier mock
    pub async fn mock_auth_invalid(&self) {
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "code": 401,
                "msg": "invalid JWT"
            })))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // /rest/v1/profiles - Subscriptions
    // =========================================================================

    /// Mock a profile row for `user_id`
    pub async fn mock_subscription(&self, user_id: &str, tier: &str, expires_at: Option<&str>) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", format!("eq.{}", user_id).as_str()))
            .and(header("apikey", TEST_SERVICE_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "id": user_id,
                "subscription_tier": tier,
                "subscription_expires_at": expires_at
            }])))
            .mount(&self.server)
            .await;
    }

    /// Mock an empty profile lookup
    pub async fn mock_subscription_missing(&self, user_id: &str) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/profiles"))
            .and(query_param("id", format!("eq.{}", user_id).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // /rest/v1/ai_usage - Usage events
    // =========================================================================

    /// Mock the exact count of a user's events for one feature
    pub async fn mock_usage_count(&self, user_id: &str, feature: &str, total: u64) {
        let content_range = if total == 0 {
            "*/0".to_string()
        } else {
            format!("0-{}/{}", total - 1, total)
        };

        Mock::given(method("HEAD"))
            .and(path("/rest/v1/ai_usage"))
            .and(query_param("user_id", format!("eq.{}", user_id).as_str()))
            .and(query_param("feature_type", format!("eq.{}", feature).as_str()))
            .and(header("Prefer", "count=exact"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-range", content_range.as_str()))
            .mount(&self.server)
            .await;
    }

    /// Mock the rows returned for daily stats
    pub async fn mock_usage_rows(&self, user_id: &str, features: &[&str]) {
        let rows: Vec<_> = features
            .iter()
            .map(|f| json!({ "feature_type": f }))
            .collect();

        Mock::given(method("GET"))
            .and(path("/rest/v1/ai_usage"))
            .and(query_param("user_id", format!("eq.{}", user_id).as_str()))
            .and(query_param("select", "feature_type"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows))
            .mount(&self.server)
            .await;
    }

    /// Accept usage inserts
    pub async fn mock_usage_insert(&self) {
        Mock::given(method("POST"))
            .and(path("/rest/v1/ai_usage"))
            .and(header("Prefer", "return=minimal"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&self.server)
            .await;
    }

    /// Fail every usage table request
    pub async fn mock_usage_unavailable(&self) {
        Mock::given(path("/rest/v1/ai_usage"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream connect error"))
            .mount(&self.server)
            .await;
    }

    // =========================================================================
    // GET /rest/v1/ - Health
    // =========================================================================

    pub async fn mock_rest_healthy(&self) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&self.server)
            .await;
    }
}
