//! Common test utilities for the usage gate
//!
//! This module provides the shared test harness used across the integration
//! tests: the real router over in-memory stores, with Supabase Auth and the
//! feature upstream served by wiremock.

#![allow(dead_code)]

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum_test::{TestRequest, TestServer};
use chrono::{Duration, Utc};

use usage_gate::{
    cache::{CacheBackend, CachedSubscriptionStore, InMemoryCache, SessionCache},
    quota::{SubscriptionRecord, SubscriptionTier, UsageLimiter},
    routes,
    store::{InMemoryStore, SubscriptionStore, SupabaseClient, UsageStore},
    AppState, Config,
};

use crate::mocks::{MockFeatureUpstream, MockSupabaseServer};

/// Test configuration constants
pub mod constants {
    /// Session token of the free test user
    pub const FREE_TOKEN: &str = "free-user-token";
    /// Free test user
    pub const FREE_USER_ID: &str = "user_free";
    /// Session token of the pro test user
    pub const PRO_TOKEN: &str = "pro-user-token";
    /// Pro test user
    pub const PRO_USER_ID: &str = "user_pro";
    /// Session token of a user whose pro plan lapsed
    pub const EXPIRED_TOKEN: &str = "expired-user-token";
    /// User whose pro plan lapsed yesterday
    pub const EXPIRED_USER_ID: &str = "user_expired";
}

/// Test harness over the real router
///
/// - In-memory subscription and usage stores
/// - In-memory cache for sessions and subscriptions
/// - Mock Supabase Auth (wiremock)
/// - Mock feature upstream (wiremock)
///
/// # Example
///
/// ```ignore
/// let app = TestApp::new().await;
/// app.upstream.mock_feature_success("lab_translator", json!({"ok": true})).await;
///
/// let response = app.authed_post(FREE_TOKEN, "/v1/features/lab_translator")
///     .json(&json!({}))
///     .await;
/// response.assert_status_ok();
/// ```
pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryStore>,
    pub supabase: MockSupabaseServer,
    pub upstream: MockFeatureUpstream,
}

impl TestApp {
    /// Create a harness with the default daily limit
    pub async fn new() -> Self {
        Self::build(|_| {}).await
    }

    /// Create a harness with a customised configuration
    pub async fn build(customise: impl FnOnce(&mut Config)) -> Self {
        let supabase = MockSupabaseServer::start().await;
        let upstream = MockFeatureUpstream::start().await;

        supabase
            .mock_auth_user(constants::FREE_TOKEN, constants::FREE_USER_ID)
            .await;
        supabase
            .mock_auth_user(constants::PRO_TOKEN, constants::PRO_USER_ID)
            .await;
        supabase
            .mock_auth_user(constants::EXPIRED_TOKEN, constants::EXPIRED_USER_ID)
            .await;
        supabase.mock_auth_invalid().await;

        let mut config = Config::for_testing(&supabase.uri(), Some(&upstream.uri()));
        customise(&mut config);

        let store = Arc::new(InMemoryStore::new());
        store.put_subscription(SubscriptionRecord::new(
            constants::FREE_USER_ID,
            SubscriptionTier::Free,
            None,
        ));
        store.put_subscription(SubscriptionRecord::new(
            constants::PRO_USER_ID,
            SubscriptionTier::Pro,
            Some(Utc::now() + Duration::days(30)),
        ));
        store.put_subscription(SubscriptionRecord::new(
            constants::EXPIRED_USER_ID,
            SubscriptionTier::Pro,
            Some(Utc::now() - Duration::days(1)),
        ));

        let cache = CacheBackend::InMemory(Arc::new(InMemoryCache::new()));
        let subscriptions: Arc<dyn SubscriptionStore> = Arc::new(CachedSubscriptionStore::new(
            cache.clone(),
            store.clone(),
            config.subscription_cache_ttl_seconds,
        ));
        let usage: Arc<dyn UsageStore> = store.clone();
        let limiter = Arc::new(UsageLimiter::new(subscriptions, usage, config.quota()));

        let supabase_client = Arc::new(SupabaseClient::new(reqwest::Client::new(), &config));
        let sessions = Arc::new(SessionCache::new(
            cache,
            supabase_client,
            config.session_cache_ttl_seconds,
        ));

        let state = Arc::new(AppState::new_for_testing(config, limiter, sessions));
        let app = routes::create_router(state);
        let server = TestServer::new(app).expect("Failed to create test server");

        Self {
            server,
            store,
            supabase,
            upstream,
        }
    }

    /// GET with a bearer token
    pub fn authed_get(&self, token: &str, path: &str) -> TestRequest {
        self.server
            .get(path)
            .add_header(header::AUTHORIZATION, bearer(token))
    }

    /// POST with a bearer token
    pub fn authed_post(&self, token: &str, path: &str) -> TestRequest {
        self.server
            .post(path)
            .add_header(header::AUTHORIZATION, bearer(token))
    }
}

/// Authorization header value for a token
pub fn bearer(token: &str) -> HeaderValue {
    format!("Bearer {}", token).parse().unwrap()
}

/// Sample request bodies for tests
pub mod test_data {
    use serde_json::json;

    /// Lab translator request
    pub fn lab_translation_request() -> serde_json::Value {
        json!({
            "labName": "Hemoglobin A1c",
            "value": "6.1",
            "unit": "%"
        })
    }

    /// Lab translator upstream response
    pub fn lab_translation_response() -> serde_json::Value {
        json!({
            "summary": "Slightly above the normal range",
            "confidence": 0.92
        })
    }
}
