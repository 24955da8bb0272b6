//! Subscription cache service
//!
//! Caches subscription lookups in front of the subscription store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::{
    cache::{redis::keys, CacheBackend},
    quota::models::SubscriptionRecord,
    routes::metrics::record_cache_operation,
    store::{StoreResult, SubscriptionStore},
};

/// Caching decorator for a [`SubscriptionStore`]
///
/// "Not found" is cached too, so users without a profile row do not hit the
/// store on every check. Cache failures fall through to the inner store: an
/// unreachable cache must not turn into a denied quota check on its own.
pub struct CachedSubscriptionStore {
    cache: CacheBackend,
    inner: Arc<dyn SubscriptionStore>,
    ttl: u64,
}

impl CachedSubscriptionStore {
    /// Create a new cached store
    pub fn new(cache: CacheBackend, inner: Arc<dyn SubscriptionStore>, ttl: u64) -> Self {
        Self { cache, inner, ttl }
    }
}

#[async_trait]
impl SubscriptionStore for CachedSubscriptionStore {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn subscription(&self, user_id: &str) -> StoreResult<Option<SubscriptionRecord>> {
        let cache_key = keys::subscription(user_id);

        // Try cache first
        match self.cache.get::<Option<SubscriptionRecord>>(&cache_key).await {
            Ok(Some(record)) => {
                debug!("Cache hit for subscription");
                record_cache_operation("subscription", "hit");
                return Ok(record);
            }
            Ok(None) => {
                debug!("Cache miss for subscription");
                record_cache_operation("subscription", "miss");
            }
            Err(e) => {
                warn!(error = %e, "Subscription cache read failed, using store");
                record_cache_operation("subscription", "error");
            }
        }

        let record = self.inner.subscription(user_id).await?;

        if let Err(e) = self.cache.set_with_ttl(&cache_key, &record, self.ttl).await {
            warn!(error = %e, "Failed to cache subscription");
        }

        Ok(record)
    }

    async fn health(&self) -> StoreResult<()> {
        self.inner.health().await
    }
}
