//! Health check endpoints
//!
//! Provides endpoints for monitoring and container orchestration:
//! - `/health` - Full health check with dependency status
//! - `/health/ready` - Readiness probe
//! - `/health/live` - Liveness probe

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::{store::StoreResult, AppState};

/// Health status enum
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual dependency check result
#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub backend: &'static str,
    pub status: HealthStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Dependency checks collection
#[derive(Debug, Serialize)]
pub struct DependencyChecks {
    pub subscriptions: DependencyCheck,
    pub usage: DependencyCheck,
}

impl DependencyChecks {
    fn overall(&self) -> HealthStatus {
        if self.subscriptions.status == HealthStatus::Unhealthy
            || self.usage.status == HealthStatus::Unhealthy
        {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Full health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub daily_free_limit: u64,
    pub checks: DependencyChecks,
}

/// Simple health response for liveness/readiness
#[derive(Debug, Serialize)]
pub struct SimpleHealthResponse {
    pub status: HealthStatus,
}

fn dependency_check(backend: &'static str, start: Instant, result: StoreResult<()>) -> DependencyCheck {
    let latency_ms = start.elapsed().as_millis() as u64;
    match result {
        Ok(()) => DependencyCheck {
            backend,
            status: HealthStatus::Healthy,
            latency_ms,
            error: None,
        },
        Err(e) => DependencyCheck {
            backend,
            status: HealthStatus::Unhealthy,
            latency_ms,
            error: Some(e.to_string()),
        },
    }
}

/// Check both stores concurrently
async fn check_stores(state: &AppState) -> DependencyChecks {
    let subscriptions = state.limiter.subscriptions();
    let usage = state.limiter.usage();

    let subscription_check = async {
        let start = Instant::now();
        dependency_check(subscriptions.name(), start, subscriptions.health().await)
    };
    let usage_check = async {
        let start = Instant::now();
        dependency_check(usage.name(), start, usage.health().await)
    };

    let (subscriptions, usage) = futures::join!(subscription_check, usage_check);
    DependencyChecks {
        subscriptions,
        usage,
    }
}

/// Full health check endpoint
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let checks = check_stores(&state).await;
    let overall_status = checks.overall();

    let response = HealthResponse {
        status: overall_status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        daily_free_limit: state.limiter.daily_limit(),
        checks,
    };

    let status_code = match overall_status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

/// Readiness probe endpoint
///
/// Returns 200 OK once both stores answer.
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SimpleHealthResponse>) {
    if check_stores(&state).await.overall() == HealthStatus::Unhealthy {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(SimpleHealthResponse {
                status: HealthStatus::Unhealthy,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(SimpleHealthResponse {
            status: HealthStatus::Healthy,
        }),
    )
}

/// Liveness probe endpoint
pub async fn liveness_check() -> (StatusCode, Json<SimpleHealthResponse>) {
    (
        StatusCode::OK,
        Json(SimpleHealthResponse {
            status: HealthStatus::Healthy,
        }),
    )
}
