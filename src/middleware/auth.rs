//! Authentication middleware
//!
//! Validates Supabase access tokens and caches validation results.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::{error::AppError, AppState};

/// Authenticated principal passed to handlers through request extensions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Extract the bearer token from an Authorization header value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Hash a token for cache keys
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Authentication middleware
///
/// 1. Extracts the bearer token from the Authorization header
/// 2. Resolves it through the session cache (Supabase Auth on a miss)
/// 3. Adds [`AuthenticatedUser`] to request extensions
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = extract_bearer_token(auth_header).ok_or(AppError::InvalidToken)?;
    let token_hash = hash_token(token);

    let user = match state.sessions.validate(token, &token_hash).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "Session validation failed");
            return Err(e);
        }
    };

    if user.user_id.is_empty() {
        warn!("Auth provider returned an empty user id");
        return Err(AppError::InvalidToken);
    }

    debug!(user_id = %user.user_id, "User authenticated");

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
