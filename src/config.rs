//! Configuration management for usage-gate
//!
//! Configuration is loaded from environment variables.

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};

use crate::quota::{QuotaConfig, DAILY_FREE_LIMIT};

/// Where usage events are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageBackend {
    /// Redis sorted sets with atomic consumption
    Redis,
    /// Supabase table over PostgREST (read-then-write)
    Supabase,
}

impl FromStr for UsageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(UsageBackend::Redis),
            "supabase" => Ok(UsageBackend::Supabase),
            other => Err(anyhow!("Unknown usage backend: {}", other)),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Redis connection URL
    pub redis_url: String,

    /// Supabase project URL
    pub supabase_url: String,
    /// Supabase service role key
    pub supabase_service_key: String,
    /// Table holding subscription tiers, keyed by user id
    pub subscription_table: String,
    /// Table holding usage events
    pub usage_table: String,

    /// Usage event backend
    pub usage_backend: UsageBackend,
    /// Free-tier daily ceiling per feature
    pub daily_free_limit: u64,
    /// Days of usage events Redis keeps (0 = forever)
    pub usage_retention_days: u64,

    /// Cache TTL for subscription records (in seconds)
    pub subscription_cache_ttl_seconds: u64,
    /// Cache TTL for validated sessions (in seconds)
    pub session_cache_ttl_seconds: u64,

    /// Base URL of the service that performs metered features
    pub feature_upstream_url: Option<String>,
    /// API key for the feature upstream
    pub feature_upstream_api_key: Option<String>,
    /// Request timeout for the HTTP layer and upstream calls (in seconds)
    pub request_timeout_seconds: u64,

    /// Emit JSON logs
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("USAGE_GATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("USAGE_GATE_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid USAGE_GATE_PORT")?,

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),

            supabase_url: env::var("SUPABASE_URL")
                .context("SUPABASE_URL must be set")?
                .trim_end_matches('/')
                .to_string(),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .context("SUPABASE_SERVICE_KEY must be set")?,
            subscription_table: env::var("SUBSCRIPTION_TABLE")
                .unwrap_or_else(|_| "profiles".to_string()),
            usage_table: env::var("USAGE_TABLE").unwrap_or_else(|_| "ai_usage".to_string()),

            usage_backend: env::var("USAGE_BACKEND")
                .unwrap_or_else(|_| "redis".to_string())
                .parse()
                .context("Invalid USAGE_BACKEND")?,
            daily_free_limit: env::var("DAILY_FREE_LIMIT")
                .unwrap_or_else(|_| DAILY_FREE_LIMIT.to_string())
                .parse()
                .context("Invalid DAILY_FREE_LIMIT")?,
            usage_retention_days: env::var("USAGE_RETENTION_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid USAGE_RETENTION_DAYS")?,

            subscription_cache_ttl_seconds: env::var("SUBSCRIPTION_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid SUBSCRIPTION_CACHE_TTL_SECONDS")?,
            session_cache_ttl_seconds: env::var("SESSION_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid SESSION_CACHE_TTL_SECONDS")?,

            feature_upstream_url: env::var("FEATURE_UPSTREAM_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string()),
            feature_upstream_api_key: env::var("FEATURE_UPSTREAM_API_KEY").ok(),
            request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .context("Invalid REQUEST_TIMEOUT_SECONDS")?,

            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    /// Limiter settings derived from this configuration
    pub fn quota(&self) -> QuotaConfig {
        QuotaConfig {
            daily_free_limit: self.daily_free_limit,
        }
    }

    /// Configuration for tests, pointing Supabase and the upstream at mock servers
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing(supabase_url: &str, upstream_url: Option<&str>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_service_key: "test-service-key".to_string(),
            subscription_table: "profiles".to_string(),
            usage_table: "ai_usage".to_string(),
            usage_backend: UsageBackend::Supabase,
            daily_free_limit: DAILY_FREE_LIMIT,
            usage_retention_days: 30,
            subscription_cache_ttl_seconds: 60,
            session_cache_ttl_seconds: 60,
            feature_upstream_url: upstream_url.map(|u| u.trim_end_matches('/').to_string()),
            feature_upstream_api_key: Some("test-upstream-key".to_string()),
            request_timeout_seconds: 10,
            log_json: false,
        }
    }
}
