//! In-memory cache implementation for testing
//!
//! Stands in for Redis during integration tests so no Redis instance is
//! needed.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};

use crate::store::StoreResult;

/// Entry in the in-memory cache with expiration
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|exp| Instant::now() > exp).unwrap_or(false)
    }
}

/// In-memory cache for testing
///
/// Same API as [`RedisCache`](super::RedisCache) for easy substitution.
#[derive(Default)]
pub struct InMemoryCache {
    data: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let data = self.data.read().unwrap_or_else(|p| p.into_inner());

        match data.get(key) {
            Some(entry) if !entry.is_expired() => {
                let parsed: T = serde_json::from_str(&entry.value)?;
                Ok(Some(parsed))
            }
            _ => Ok(None),
        }
    }

    /// Set a value in cache with custom TTL (0 = no expiry)
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> StoreResult<()> {
        let serialized = serde_json::to_string(value)?;
        let expires_at = if ttl_seconds > 0 {
            Some(Instant::now() + Duration::from_secs(ttl_seconds))
        } else {
            None
        };

        let mut data = self.data.write().unwrap_or_else(|p| p.into_inner());
        data.insert(
            key.to_string(),
            CacheEntry {
                value: serialized,
                expires_at,
            },
        );
        Ok(())
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let data = self.data.read().unwrap_or_else(|p| p.into_inner());
        data.values().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
