//! Quota metering middleware
//!
//! Wraps a feature handler with the daily quota:
//! 1. reserve quota before the handler runs (atomic where the store allows)
//! 2. reject with 429 when the quota is spent, without running the handler
//! 3. commit the reservation when the handler succeeded, release it otherwise

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info, warn};

use crate::{
    error::AppError,
    middleware::auth::AuthenticatedUser,
    quota::models::{DailyStats, Decision, DecisionErrorKind},
    routes::metrics::{record_decision, record_usage_write},
    AppState,
};

static FEATURE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_-]{1,64}$").expect("valid feature key pattern"));

/// Whether a feature key is acceptable from the outside
///
/// Names used by the daily stats summary are refused.
pub fn is_valid_feature_key(feature: &str) -> bool {
    FEATURE_KEY.is_match(feature) && !DailyStats::RESERVED_KEYS.iter().any(|key| *key == feature)
}

/// Rate limit headers for a capped decision
///
/// Pro decisions get none. `Retry-After` is added when the request is denied.
pub fn quota_headers(decision: &Decision) -> Vec<(HeaderName, HeaderValue)> {
    let (Some(limit), Some(remaining)) = (decision.limit.as_finite(), decision.remaining.as_finite())
    else {
        return Vec::new();
    };

    let mut headers = vec![
        (
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderValue::from(limit),
        ),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderValue::from(remaining),
        ),
    ];

    if let Some(reset_at) = decision.reset_at {
        headers.push((
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderValue::from(reset_at.timestamp()),
        ));

        if !decision.allowed {
            let retry_after = (reset_at.timestamp() - chrono::Utc::now().timestamp()).max(1);
            headers.push((header::RETRY_AFTER, HeaderValue::from(retry_after)));
        }
    }

    headers
}

/// Response for a denied decision
pub fn rejection_response(feature: &str, decision: &Decision) -> Response {
    let error = match decision.error.as_ref().map(|e| e.kind) {
        Some(DecisionErrorKind::Unauthenticated) => AppError::Unauthorized,
        Some(DecisionErrorKind::StorageUnavailable) => AppError::ServiceUnavailable(
            "Usage quota is temporarily unavailable".to_string(),
        ),
        None => AppError::QuotaExceeded {
            message: format!("Daily limit reached for {}", feature),
            limit: decision.limit.as_finite().unwrap_or(0),
            used: decision.used.unwrap_or(0),
            remaining: decision.remaining.as_finite().unwrap_or(0),
            is_pro: decision.is_pro,
            reset_at: decision.reset_at.map(|dt| dt.to_rfc3339()),
        },
    };

    let mut response = error.into_response();
    let headers = response.headers_mut();
    for (name, value) in quota_headers(decision) {
        headers.insert(name, value);
    }
    response
}

/// Metering middleware for `/{feature}` routes
///
/// Must run after [`auth_middleware`](crate::middleware::auth::auth_middleware).
/// The decision is added to request extensions for the handler.
pub async fn metered_middleware(
    State(state): State<Arc<AppState>>,
    Path(feature): Path<String>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(user) = request.extensions().get::<AuthenticatedUser>().cloned() else {
        return AppError::Unauthorized.into_response();
    };

    if !is_valid_feature_key(&feature) {
        return AppError::BadRequest(format!("Invalid feature: {}", feature)).into_response();
    }

    let reservation = state.limiter.reserve(&user.user_id, &feature).await;
    let decision = reservation.decision().clone();
    record_decision(&feature, &decision);

    if !reservation.allowed() {
        warn!(
            user_id = %user.user_id,
            feature = %feature,
            used = ?decision.used,
            error = ?decision.error,
            "Metered request rejected"
        );
        return rejection_response(&feature, &decision);
    }

    request.extensions_mut().insert(decision.clone());

    // The handler and the commit/release run as their own task so a dropped
    // connection or timeout cannot strand a consumed reservation.
    let finalize = tokio::spawn({
        let state = state.clone();
        let feature = feature.clone();
        async move {
            let response = next.run(request).await;

            if response.status().is_success() {
                let recorded = state.limiter.commit(reservation).await;
                record_usage_write(&feature, recorded);
                if !recorded {
                    warn!(user_id = %user.user_id, feature = %feature, "Usage went unrecorded");
                }
            } else {
                info!(
                    user_id = %user.user_id,
                    feature = %feature,
                    status = %response.status(),
                    "Metered request failed, releasing quota"
                );
                state.limiter.release(reservation).await;
            }

            response
        }
    });

    let mut response = match finalize.await {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, feature = %feature, "Metered request task failed");
            return AppError::Internal(anyhow::anyhow!("Metered request task failed: {}", e))
                .into_response();
        }
    };

    let headers = response.headers_mut();
    for (name, value) in quota_headers(&decision) {
        headers.insert(name, value);
    }

    response
}
