//! Metered feature endpoint
//!
//! `POST /v1/features/{feature}` forwards the JSON body to the upstream
//! feature service. Quota is enforced by the metering middleware around it.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    response::Response,
    Extension, Json,
};
use tracing::info;

use crate::{
    error::AppResult,
    middleware::auth::AuthenticatedUser,
    routes::metrics::record_feature_request,
    AppState,
};

/// Forward a metered feature request
pub async fn invoke_feature(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(feature): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<Response> {
    let start_time = Instant::now();

    let result = state.upstream.forward(&feature, &user.user_id, &body).await;

    let duration = start_time.elapsed().as_secs_f64();
    let status_label = match &result {
        Ok(response) if response.status().is_success() => "success",
        _ => "error",
    };
    record_feature_request(&feature, status_label, duration);

    info!(
        feature = %feature,
        user_id = %user.user_id,
        status = status_label,
        duration_ms = %format!("{:.2}", duration * 1000.0),
        "Feature request completed"
    );

    result
}
