//! Daily quota for metered AI features
//!
//! Free, trial and lapsed pro users get a fixed number of invocations per
//! feature per calendar day; active pro users are never throttled.

pub mod limiter;
pub mod models;
pub mod window;

pub use limiter::{QuotaConfig, Reservation, UsageLimiter, DAILY_FREE_LIMIT};
pub use models::{
    features, Allowance, DailyStats, Decision, DecisionError, DecisionErrorKind,
    SubscriptionRecord, SubscriptionTier, UsageEvent,
};
