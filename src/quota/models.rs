//! Quota data models
//!
//! Subscription records, usage events, and the derived decision and stats
//! shapes returned to callers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Well-known metered feature keys
///
/// Feature types are an open set; new features just use a new key.
pub mod features {
    /// Lab report translator
    pub const LAB_TRANSLATOR: &str = "lab_translator";
    /// Product comparison insights
    pub const COMPARISON_INSIGHTS: &str = "comparison_insights";
}

/// Subscription tier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Trial,
    Pro,
    /// Also any tier string this service does not know
    #[default]
    #[serde(other)]
    Free,
}

/// Subscription record owned by the user store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionRecord {
    pub user_id: String,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    #[serde(default)]
    pub subscription_expires_at: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    pub fn new(user_id: &str, tier: SubscriptionTier, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            user_id: user_id.to_string(),
            subscription_tier: tier,
            subscription_expires_at: expires_at,
        }
    }

    /// Whether the record grants unmetered access at `now`
    ///
    /// Only `pro` counts, and only while the expiry is absent or in the future.
    pub fn is_pro_at(&self, now: DateTime<Utc>) -> bool {
        self.subscription_tier == SubscriptionTier::Pro
            && self
                .subscription_expires_at
                .map(|expires_at| expires_at > now)
                .unwrap_or(true)
    }
}

/// A single metered invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageEvent {
    pub id: Uuid,
    pub user_id: String,
    pub feature_type: String,
    pub created_at: DateTime<Utc>,
}

impl UsageEvent {
    /// Create a new event with a fresh id
    pub fn new(user_id: &str, feature_type: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            feature_type: feature_type.to_string(),
            created_at,
        }
    }
}

/// A ceiling or remaining count that may be unbounded
///
/// Serializes as a number, or as the string `"unlimited"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowance {
    Finite(u64),
    Unbounded,
}

impl Allowance {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Allowance::Unbounded)
    }

    pub fn as_finite(&self) -> Option<u64> {
        match self {
            Allowance::Finite(n) => Some(*n),
            Allowance::Unbounded => None,
        }
    }
}

impl fmt::Display for Allowance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Allowance::Finite(n) => write!(f, "{}", n),
            Allowance::Unbounded => f.write_str("unlimited"),
        }
    }
}

impl Serialize for Allowance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Allowance::Finite(n) => serializer.serialize_u64(*n),
            Allowance::Unbounded => serializer.serialize_str("unlimited"),
        }
    }
}

/// Why a decision could not be made
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionErrorKind {
    /// Caller passed no user id
    Unauthenticated,
    /// Subscription lookup or usage count failed
    StorageUnavailable,
}

/// Error marker attached to a failed decision
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DecisionError {
    pub kind: DecisionErrorKind,
    pub message: String,
}

/// Outcome of a quota check
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,
    pub remaining: Allowance,
    pub limit: Allowance,
    pub is_pro: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DecisionError>,
}

impl Decision {
    /// Unmetered decision for an active pro subscription
    pub fn unlimited() -> Self {
        Self {
            allowed: true,
            remaining: Allowance::Unbounded,
            limit: Allowance::Unbounded,
            is_pro: true,
            used: None,
            reset_at: None,
            error: None,
        }
    }

    /// Decision for a capped tier given today's usage
    pub fn capped(used: u64, limit: u64, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: used < limit,
            remaining: Allowance::Finite(limit.saturating_sub(used)),
            limit: Allowance::Finite(limit),
            is_pro: false,
            used: Some(used),
            reset_at: Some(reset_at),
            error: None,
        }
    }

    /// Denied decision carrying an error marker
    pub fn failed(kind: DecisionErrorKind, message: impl Into<String>, limit: u64) -> Self {
        Self {
            allowed: false,
            remaining: Allowance::Finite(0),
            limit: Allowance::Finite(limit),
            is_pro: false,
            used: None,
            reset_at: None,
            error: Some(DecisionError {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Today's usage, per feature and in total
///
/// Feature counts share the top-level JSON object with `total` and
/// `remaining`, so those two names cannot be feature keys.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyStats {
    #[serde(flatten)]
    pub features: BTreeMap<String, u64>,
    pub total: u64,
    pub remaining: u64,
}

impl DailyStats {
    /// Keys taken by the summary fields
    pub const RESERVED_KEYS: [&'static str; 2] = ["total", "remaining"];

    /// Aggregate a list of feature keys (one per event)
    pub fn from_features<I, S>(features: I, limit: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for feature in features {
            *counts.entry(feature.into()).or_insert(0) += 1;
        }
        let total = counts.values().sum();

        Self {
            features: counts,
            total,
            remaining: limit.saturating_sub(total),
        }
    }

    /// Count for a single feature
    pub fn count(&self, feature: &str) -> u64 {
        self.features.get(feature).copied().unwrap_or(0)
    }
}
