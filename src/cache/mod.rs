//! Cache module
//!
//! Provides Redis-based caching for subscription records and sessions.

#[cfg(any(test, feature = "test-utils"))]
pub mod in_memory;
pub mod redis;
pub mod session;
pub mod subscription;

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::store::StoreResult;

#[cfg(any(test, feature = "test-utils"))]
pub use self::in_memory::InMemoryCache;
pub use self::redis::RedisCache;
pub use self::session::SessionCache;
pub use self::subscription::CachedSubscriptionStore;

/// Cache backend shared by the caching services
#[derive(Clone)]
pub enum CacheBackend {
    /// Redis-based cache for production use
    Redis(Arc<RedisCache>),
    /// In-memory cache for testing
    #[cfg(any(test, feature = "test-utils"))]
    InMemory(Arc<InMemoryCache>),
}

impl CacheBackend {
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self {
            CacheBackend::Redis(cache) => cache.get(key).await,
            #[cfg(any(test, feature = "test-utils"))]
            CacheBackend::InMemory(cache) => cache.get(key).await,
        }
    }

    pub async fn set_with_ttl<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> StoreResult<()> {
        match self {
            CacheBackend::Redis(cache) => cache.set_with_ttl(key, value, ttl_seconds).await,
            #[cfg(any(test, feature = "test-utils"))]
            CacheBackend::InMemory(cache) => cache.set_with_ttl(key, value, ttl_seconds).await,
        }
    }
}
