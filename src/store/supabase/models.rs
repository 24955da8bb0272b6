//! Supabase row and response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quota::models::{SubscriptionRecord, SubscriptionTier};

/// Row of the subscription (profiles) table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: String,
    #[serde(default)]
    pub subscription_tier: Option<SubscriptionTier>,
    #[serde(default)]
    pub subscription_expires_at: Option<DateTime<Utc>>,
}

impl From<ProfileRow> for SubscriptionRecord {
    fn from(row: ProfileRow) -> Self {
        SubscriptionRecord {
            user_id: row.id,
            subscription_tier: row.subscription_tier.unwrap_or_default(),
            subscription_expires_at: row.subscription_expires_at,
        }
    }
}

/// Insert payload for the usage table
///
/// `created_at` is left to the column default so the database clock stamps it.
#[derive(Debug, Clone, Serialize)]
pub struct UsageInsertRow<'a> {
    pub user_id: &'a str,
    pub feature_type: &'a str,
}

/// Projection used for daily stats
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureRow {
    pub feature_type: String,
}

/// User returned by `GET /auth/v1/user`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Total from a PostgREST `Content-Range` header (`0-2/3` or `*/0`)
pub fn content_range_total(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}
