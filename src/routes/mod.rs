//! HTTP routes for the usage gate
//!
//! This module defines all HTTP endpoints exposed by the service.

pub mod features;
pub mod health;
pub mod metrics;
pub mod usage;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    middleware::{auth::auth_middleware, quota::metered_middleware},
    AppState,
};

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Metering needs the matched `:feature` path, so it goes on as a route layer
    let metered_routes = Router::new()
        .route("/v1/features/:feature", post(features::invoke_feature))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            metered_middleware,
        ));

    // Routes that require authentication
    // Middleware is applied in reverse order (last applied runs first)
    // So: auth runs first, then metering
    let protected_routes = Router::new()
        .route("/v1/usage", get(usage::daily_stats))
        .route("/v1/usage/:feature", get(usage::check_feature))
        .merge(metered_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Public routes (health checks, metrics) - no auth required
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .route("/metrics", get(metrics::prometheus_metrics));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Global middleware (applied to all routes)
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.request_timeout_seconds,
        )))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
