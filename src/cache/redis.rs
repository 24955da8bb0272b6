//! Redis cache implementation
//!
//! Handles caching of subscription records and validated sessions.

use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

use crate::store::StoreResult;

/// Redis cache wrapper
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    /// Create a new Redis cache
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    /// Get a value from cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => {
                let parsed: T = serde_json::from_str(&v)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// Set a value in cache with custom TTL
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let serialized = serde_json::to_string(value)?;
        let _: () = conn.set_ex(key, serialized, ttl_seconds).await?;
        Ok(())
    }
}

/// Cache key prefixes
pub mod keys {
    /// Subscription record cache key
    pub fn subscription(user_id: &str) -> String {
        format!("usage_gate:subscription:{}", user_id)
    }

    /// Validated session cache key
    pub fn session(token_hash: &str) -> String {
        format!("usage_gate:session:{}", token_hash)
    }
}
