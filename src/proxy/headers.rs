//! Header utilities for upstream forwarding
//!
//! Client credentials are never forwarded: the upstream sees only the
//! gateway's own API key and the authenticated user id.

use axum::http::header::{self, HeaderName};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{AppError, AppResult};

/// Header carrying the authenticated user id to the upstream
pub const USER_ID_HEADER: &str = "x-usage-gate-user";

/// Hop-by-hop headers that must never be forwarded
const HOP_BY_HOP_HEADERS: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Build headers for upstream feature requests
pub fn build_upstream_headers(api_key: Option<&str>, user_id: &str) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    if let Some(api_key) = api_key {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|_| {
                AppError::Internal(anyhow::anyhow!("Invalid FEATURE_UPSTREAM_API_KEY format"))
            })?,
        );
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_ID_HEADER,
        HeaderValue::from_str(user_id)
            .map_err(|_| AppError::BadRequest("User id is not a valid header value".to_string()))?,
    );

    Ok(headers)
}

/// Check if a header is a hop-by-hop header that should not be forwarded
pub fn is_hop_by_hop_header(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(name)
}
