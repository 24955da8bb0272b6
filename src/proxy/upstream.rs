//! Feature upstream client
//!
//! Forwards metered feature requests to the service that does the actual AI
//! work, e.g. `POST {upstream}/lab_translator`.

use axum::body::Body;
use axum::http::{Response, StatusCode};
use tracing::{debug, error, info, instrument};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    proxy::headers::{build_upstream_headers, is_hop_by_hop_header},
};

/// Client for the upstream feature service
pub struct FeatureUpstream {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
}

impl FeatureUpstream {
    /// Create a new upstream client
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.feature_upstream_url.clone(),
            api_key: config.feature_upstream_api_key.clone(),
        }
    }

    /// Check if an upstream URL is configured
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Forward a JSON body to the feature endpoint
    #[instrument(skip(self, body), fields(feature = %feature, user_id = %user_id))]
    pub async fn forward(
        &self,
        feature: &str,
        user_id: &str,
        body: &serde_json::Value,
    ) -> AppResult<Response<Body>> {
        let base_url = self.base_url.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable("FEATURE_UPSTREAM_URL is not configured".to_string())
        })?;

        let url = format!("{}/{}", base_url, feature);
        info!(url = %url, "Forwarding feature request upstream");

        let response = self
            .client
            .post(&url)
            .headers(build_upstream_headers(self.api_key.as_deref(), user_id)?)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "Failed to send request upstream");
                e
            })?;

        debug!(status = %response.status(), "Received upstream response");

        convert_response(response)
    }
}

/// Convert a reqwest response into an axum response, streaming the body
fn convert_response(response: reqwest::Response) -> AppResult<Response<Body>> {
    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut builder = Response::builder().status(status);

    for (name, value) in response.headers() {
        if !is_hop_by_hop_header(name) {
            builder = builder.header(name.clone(), value.clone());
        }
    }

    builder
        .body(Body::from_stream(response.bytes_stream()))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build response: {}", e)))
}
