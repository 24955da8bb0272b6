//! Supabase client
//!
//! PostgREST and Auth calls for subscription lookups, usage events and
//! session validation.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, error, instrument, warn};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    quota::models::{SubscriptionRecord, UsageEvent},
    store::{
        supabase::models::{content_range_total, AuthUser, FeatureRow, ProfileRow, UsageInsertRow},
        StoreError, StoreResult, SubscriptionStore, UsageStore,
    },
};

/// Supabase REST client
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    subscription_table: String,
    usage_table: String,
}

impl SupabaseClient {
    /// Create a new Supabase client
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.supabase_url.clone(),
            service_key: config.supabase_service_key.clone(),
            subscription_table: config.subscription_table.clone(),
            usage_table: config.usage_table.clone(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Validate a user's access token and return the user
    #[instrument(skip(self, token))]
    pub async fn validate_user(&self, token: &str) -> AppResult<AuthUser> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("apikey", self.header_value(&self.service_key)?)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to Supabase Auth");
                e
            })?;

        let status = response.status();
        debug!(status = %status, "Supabase Auth response status");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();

            if status.as_u16() == 401 || status.as_u16() == 403 {
                warn!(status = %status, "Session validation failed - unauthorized");
                return Err(AppError::InvalidToken);
            }

            error!(status = %status, body = %text, "Supabase Auth request failed");
            return Err(AppError::UpstreamError(format!(
                "Supabase Auth error {}: {}",
                status, text
            )));
        }

        let body = response.text().await?;
        let user: AuthUser = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse Supabase Auth response");
            AppError::UpstreamError(format!("Failed to parse Supabase Auth response: {}", e))
        })?;

        debug!(user_id = %user.id, "Session validated");
        Ok(user)
    }

    /// Build headers with service key authentication
    fn service_headers(&self) -> StoreResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", self.store_header_value(&self.service_key)?);
        headers.insert(
            AUTHORIZATION,
            self.store_header_value(&format!("Bearer {}", self.service_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    fn header_value(&self, value: &str) -> AppResult<HeaderValue> {
        HeaderValue::from_str(value)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid Supabase key format")))
    }

    fn store_header_value(&self, value: &str) -> StoreResult<HeaderValue> {
        HeaderValue::from_str(value)
            .map_err(|_| StoreError::Unavailable("Invalid Supabase key format".to_string()))
    }

    async fn check_status(response: reqwest::Response, operation: &str) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        error!(status = %status, body = %text, operation, "Supabase request failed");
        Err(StoreError::Unavailable(format!(
            "Supabase {} error {}: {}",
            operation, status, text
        )))
    }
}

fn since_filter(since: DateTime<Utc>) -> String {
    format!("gte.{}", since.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[async_trait]
impl SubscriptionStore for SupabaseClient {
    fn name(&self) -> &'static str {
        "supabase"
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn subscription(&self, user_id: &str) -> StoreResult<Option<SubscriptionRecord>> {
        let response = self
            .client
            .get(self.table_url(&self.subscription_table))
            .headers(self.service_headers()?)
            .query(&[
                ("id", format!("eq.{}", user_id)),
                (
                    "select",
                    "id,subscription_tier,subscription_expires_at".to_string(),
                ),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;
        let response = Self::check_status(response, "subscription lookup").await?;

        let rows: Vec<ProfileRow> = serde_json::from_str(&response.text().await?)?;
        debug!(found = !rows.is_empty(), "Subscription lookup finished");
        Ok(rows.into_iter().next().map(SubscriptionRecord::from))
    }

    async fn health(&self) -> StoreResult<()> {
        let response = self
            .client
            .get(format!("{}/rest/v1/", self.base_url))
            .headers(self.service_headers()?)
            .send()
            .await?;
        Self::check_status(response, "health").await?;
        Ok(())
    }
}

#[async_trait]
impl UsageStore for SupabaseClient {
    fn name(&self) -> &'static str {
        "supabase"
    }

    #[instrument(skip(self, event), fields(user_id = %event.user_id, feature = %event.feature_type))]
    async fn insert(&self, event: &UsageEvent) -> StoreResult<()> {
        let row = UsageInsertRow {
            user_id: &event.user_id,
            feature_type: &event.feature_type,
        };

        let response = self
            .client
            .post(self.table_url(&self.usage_table))
            .headers(self.service_headers()?)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        Self::check_status(response, "usage insert").await?;

        debug!("Usage event stored");
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, feature = %feature_type))]
    async fn count_since(
        &self,
        user_id: &str,
        feature_type: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let response = self
            .client
            .head(self.table_url(&self.usage_table))
            .headers(self.service_headers()?)
            .header("Prefer", "count=exact")
            .query(&[
                ("select", "id".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("feature_type", format!("eq.{}", feature_type)),
                ("created_at", since_filter(since)),
            ])
            .send()
            .await?;
        let response = Self::check_status(response, "usage count").await?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|h| h.to_str().ok())
            .and_then(content_range_total)
            .ok_or_else(|| {
                StoreError::Unavailable("Supabase count response missing Content-Range".to_string())
            })?;

        debug!(count = total, "Usage count finished");
        Ok(total)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn features_since(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<String>> {
        let response = self
            .client
            .get(self.table_url(&self.usage_table))
            .headers(self.service_headers()?)
            .query(&[
                ("select", "feature_type".to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("created_at", since_filter(since)),
            ])
            .send()
            .await?;
        let response = Self::check_status(response, "usage stats").await?;

        let rows: Vec<FeatureRow> = serde_json::from_str(&response.text().await?)?;
        Ok(rows.into_iter().map(|r| r.feature_type).collect())
    }

    async fn health(&self) -> StoreResult<()> {
        SubscriptionStore::health(self).await
    }
}
