//! Usage endpoints
//!
//! - `GET /v1/usage` - today's usage per feature
//! - `GET /v1/usage/{feature}` - quota decision for one feature (no side effects)

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::{
    error::{AppError, AppResult},
    middleware::{
        auth::AuthenticatedUser,
        quota::{is_valid_feature_key, quota_headers},
    },
    quota::models::DailyStats,
    AppState,
};

/// Today's usage for the authenticated user
pub async fn daily_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<DailyStats>> {
    state
        .limiter
        .daily_stats(&user.user_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::ServiceUnavailable("Usage stats are temporarily unavailable".to_string()))
}

/// Quota decision for one feature
///
/// Always 200 when a decision was made, even if not allowed; the body tells
/// the client how much is left.
pub async fn check_feature(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(feature): Path<String>,
) -> AppResult<Response> {
    if !is_valid_feature_key(&feature) {
        return Err(AppError::BadRequest(format!("Invalid feature: {}", feature)));
    }

    let decision = state.limiter.check(&user.user_id, &feature).await;
    if decision.is_error() {
        return Err(AppError::ServiceUnavailable(
            "Usage quota is temporarily unavailable".to_string(),
        ));
    }

    let headers = quota_headers(&decision);
    let mut response = Json(decision).into_response();
    for (name, value) in headers {
        response.headers_mut().insert(name, value);
    }
    Ok(response)
}
