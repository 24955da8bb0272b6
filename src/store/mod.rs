//! Storage backends for subscription records and usage events
//!
//! The limiter only talks to these traits. Backends:
//! - [`RedisUsageStore`] for usage events with atomic consumption
//! - [`SupabaseClient`] for subscription records and usage events over PostgREST
//! - `InMemoryStore` for tests

#[cfg(any(test, feature = "test-utils"))]
pub mod in_memory;
pub mod redis;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::quota::models::{SubscriptionRecord, UsageEvent};

#[cfg(any(test, feature = "test-utils"))]
pub use self::in_memory::InMemoryStore;
pub use self::redis::RedisUsageStore;
pub use self::supabase::SupabaseClient;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Operation not supported by {0}")]
    Unsupported(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of an atomic check-and-consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// Event stored; `used` includes it
    Granted { used: u64 },
    /// Limit already reached; nothing stored
    Denied { used: u64 },
}

/// Point lookup of subscription records
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Backend name for logs and metrics
    fn name(&self) -> &'static str;

    /// Look up the subscription record for a user
    async fn subscription(&self, user_id: &str) -> StoreResult<Option<SubscriptionRecord>>;

    /// Cheap connectivity check
    async fn health(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Append-only usage event log
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Backend name for logs and metrics
    fn name(&self) -> &'static str;

    /// Append one event
    async fn insert(&self, event: &UsageEvent) -> StoreResult<()>;

    /// Count events for a user and feature created at or after `since`
    async fn count_since(
        &self,
        user_id: &str,
        feature_type: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Feature key of every event for a user created at or after `since`
    async fn features_since(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<String>>;

    /// Count and insert in one atomic step, only if the count is below `limit`
    ///
    /// Returns `None` when the backend has no atomic counters; callers fall
    /// back to a separate count and insert.
    async fn consume(
        &self,
        _event: &UsageEvent,
        _since: DateTime<Utc>,
        _limit: u64,
    ) -> StoreResult<Option<Consumption>> {
        Ok(None)
    }

    /// Remove an event previously stored by [`UsageStore::consume`]
    async fn retract(&self, _event: &UsageEvent) -> StoreResult<()> {
        Err(StoreError::Unsupported(self.name()))
    }

    /// Cheap connectivity check
    async fn health(&self) -> StoreResult<()> {
        Ok(())
    }
}
