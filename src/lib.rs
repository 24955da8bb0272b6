//! Usage gate - daily AI feature quotas
//!
//! This library provides the core functionality for the usage gate server.
//! It authenticates users against Supabase, decides whether a user may invoke
//! an AI feature today, and records usage for the metered feature proxy.

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod quota;
pub mod routes;
pub mod store;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::info;

pub use crate::cache::{CacheBackend, CachedSubscriptionStore, RedisCache, SessionCache};
pub use crate::config::{Config, UsageBackend};
pub use crate::proxy::FeatureUpstream;
pub use crate::quota::UsageLimiter;
pub use crate::store::{RedisUsageStore, SubscriptionStore, SupabaseClient, UsageStore};

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub start_time: Instant,
    /// Quota decisions over the subscription and usage stores
    pub limiter: Arc<UsageLimiter>,
    /// Bearer token validation with caching
    pub sessions: Arc<SessionCache>,
    /// Upstream for metered feature requests
    pub upstream: Arc<FeatureUpstream>,
}

impl AppState {
    /// Create a new application state
    pub async fn new(config: Config) -> Result<Self> {
        // Initialize Redis connection
        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = redis::aio::ConnectionManager::new(redis_client).await?;

        // Initialize HTTP client with connection pooling
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        let supabase = Arc::new(SupabaseClient::new(http_client.clone(), &config));
        let cache = CacheBackend::Redis(Arc::new(RedisCache::new(redis.clone())));

        // Subscription lookups go through the cache
        let subscriptions: Arc<dyn SubscriptionStore> = Arc::new(CachedSubscriptionStore::new(
            cache.clone(),
            supabase.clone(),
            config.subscription_cache_ttl_seconds,
        ));

        let usage: Arc<dyn UsageStore> = match config.usage_backend {
            UsageBackend::Redis => Arc::new(RedisUsageStore::new(
                redis.clone(),
                config.usage_retention_days,
            )),
            UsageBackend::Supabase => supabase.clone(),
        };
        info!(backend = usage.name(), "Usage store initialized");

        let limiter = Arc::new(UsageLimiter::new(subscriptions, usage, config.quota()));
        let sessions = Arc::new(SessionCache::new(
            cache,
            supabase,
            config.session_cache_ttl_seconds,
        ));
        let upstream = Arc::new(FeatureUpstream::new(http_client, &config));

        Ok(Self {
            config,
            start_time: Instant::now(),
            limiter,
            sessions,
            upstream,
        })
    }

    /// Create a new application state for testing
    ///
    /// Callers supply the limiter and session cache, typically over
    /// in-memory stores and a mocked Supabase server.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(
        config: Config,
        limiter: Arc<UsageLimiter>,
        sessions: Arc<SessionCache>,
    ) -> Self {
        let upstream = Arc::new(FeatureUpstream::new(reqwest::Client::new(), &config));

        Self {
            config,
            start_time: Instant::now(),
            limiter,
            sessions,
            upstream,
        }
    }
}
