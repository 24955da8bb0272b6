//! Session cache service
//!
//! Validates bearer tokens against Supabase Auth and caches the result by
//! token hash.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::{
    cache::{redis::keys, CacheBackend},
    error::AppResult,
    middleware::auth::AuthenticatedUser,
    routes::metrics::record_cache_operation,
    store::SupabaseClient,
};

/// Session validation with caching
pub struct SessionCache {
    cache: CacheBackend,
    supabase: Arc<SupabaseClient>,
    ttl: u64,
}

impl SessionCache {
    /// Create a new session cache
    pub fn new(cache: CacheBackend, supabase: Arc<SupabaseClient>, ttl: u64) -> Self {
        Self {
            cache,
            supabase,
            ttl,
        }
    }

    /// Validate a token and resolve the user, using cache if available
    ///
    /// `token_hash` should be a SHA-256 hash of the token.
    #[instrument(skip(self, token), fields(token_hash = %token_hash))]
    pub async fn validate(&self, token: &str, token_hash: &str) -> AppResult<AuthenticatedUser> {
        let cache_key = keys::session(token_hash);

        match self.cache.get::<AuthenticatedUser>(&cache_key).await {
            Ok(Some(user)) => {
                debug!("Cache hit for session");
                record_cache_operation("session", "hit");
                return Ok(user);
            }
            Ok(None) => {
                debug!("Cache miss for session, validating with Supabase");
                record_cache_operation("session", "miss");
            }
            Err(e) => {
                warn!(error = %e, "Session cache read failed");
                record_cache_operation("session", "error");
            }
        }

        let auth_user = self.supabase.validate_user(token).await?;
        let user = AuthenticatedUser {
            user_id: auth_user.id,
            email: auth_user.email,
        };

        if let Err(e) = self.cache.set_with_ttl(&cache_key, &user, self.ttl).await {
            warn!(error = %e, "Failed to cache session");
        }

        Ok(user)
    }
}
