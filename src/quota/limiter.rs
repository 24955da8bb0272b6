//! Daily usage limiter
//!
//! Decides whether a user may invoke a metered feature, records successful
//! invocations and reports today's usage. All state lives in the stores; the
//! limiter itself holds none, so any number of instances can run side by side.
//!
//! Failure policy:
//! - reads fail closed: a lookup or count error denies the request
//! - writes fail open: a lost `record` can only under-count

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, error, instrument, warn};

use crate::{
    quota::{
        models::{DailyStats, Decision, DecisionErrorKind, UsageEvent},
        window,
    },
    store::{Consumption, StoreResult, SubscriptionStore, UsageStore},
};

/// Free-tier invocations per feature per day
pub const DAILY_FREE_LIMIT: u64 = 3;

/// Limiter settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaConfig {
    /// Ceiling applied to every non-pro tier
    pub daily_free_limit: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_free_limit: DAILY_FREE_LIMIT,
        }
    }
}

/// What finalizing a reservation has to do
#[derive(Debug, Clone, PartialEq)]
enum Pending {
    /// Denied or failed; nothing to finalize
    Nothing,
    /// Insert an event on commit
    Record { user_id: String, feature_type: String },
    /// Event already stored atomically; retract it on release
    Consumed(UsageEvent),
}

/// Quota held for one metered invocation
///
/// Obtained from [`UsageLimiter::reserve`]. Finish with
/// [`UsageLimiter::commit`] once the work succeeded, or
/// [`UsageLimiter::release`] when it failed.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a reservation must be committed or released"]
pub struct Reservation {
    decision: Decision,
    pending: Pending,
}

impl Reservation {
    fn denied(decision: Decision) -> Self {
        Self {
            decision,
            pending: Pending::Nothing,
        }
    }

    /// Decision made while reserving
    pub fn decision(&self) -> &Decision {
        &self.decision
    }

    pub fn allowed(&self) -> bool {
        self.decision.allowed
    }

    /// Whether the event was already stored when reserving
    pub fn is_consumed(&self) -> bool {
        matches!(self.pending, Pending::Consumed(_))
    }
}

/// Per-user, per-feature daily quota
pub struct UsageLimiter {
    subscriptions: Arc<dyn SubscriptionStore>,
    usage: Arc<dyn UsageStore>,
    config: QuotaConfig,
}

impl UsageLimiter {
    /// Create a new limiter over the given stores
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        usage: Arc<dyn UsageStore>,
        config: QuotaConfig,
    ) -> Self {
        Self {
            subscriptions,
            usage,
            config,
        }
    }

    /// Ceiling applied to non-pro tiers
    pub fn daily_limit(&self) -> u64 {
        self.config.daily_free_limit
    }

    pub fn subscriptions(&self) -> &Arc<dyn SubscriptionStore> {
        &self.subscriptions
    }

    pub fn usage(&self) -> &Arc<dyn UsageStore> {
        &self.usage
    }

    /// Check whether `user_id` may invoke `feature_type` now
    ///
    /// Never writes and never fails: errors come back as a denied decision
    /// with an error marker.
    pub async fn check(&self, user_id: &str, feature_type: &str) -> Decision {
        self.check_at(user_id, feature_type, Local::now()).await
    }

    /// [`UsageLimiter::check`] against an explicit clock reading
    #[instrument(skip(self, now), fields(user_id = %user_id, feature = %feature_type))]
    pub async fn check_at(&self, user_id: &str, feature_type: &str, now: DateTime<Local>) -> Decision {
        if user_id.is_empty() {
            return self.unauthenticated();
        }

        match self.is_pro(user_id, now.with_timezone(&Utc)).await {
            Ok(true) => {
                debug!("Pro subscription, skipping usage count");
                return Decision::unlimited();
            }
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "Subscription lookup failed, denying");
                return self.storage_failure(e.to_string());
            }
        }

        self.capped_decision(user_id, feature_type, now).await
    }

    /// Count today's usage for a user already known not to be Pro
    async fn capped_decision(&self, user_id: &str, feature_type: &str, now: DateTime<Local>) -> Decision {
        match self
            .usage
            .count_since(user_id, feature_type, window::start_of_day(&now))
            .await
        {
            Ok(used) => {
                let decision = Decision::capped(used, self.daily_limit(), window::next_reset(&now));
                debug!(used, allowed = decision.allowed, "Quota checked");
                decision
            }
            Err(e) => {
                error!(error = %e, "Usage count failed, denying");
                self.storage_failure(e.to_string())
            }
        }
    }

    /// Record one successful invocation
    ///
    /// Call only after the metered work completed. Returns `false` when no user
    /// id was given or the write failed.
    pub async fn record(&self, user_id: &str, feature_type: &str) -> bool {
        self.record_at(user_id, feature_type, Utc::now()).await
    }

    /// [`UsageLimiter::record`] with an explicit event timestamp
    #[instrument(skip(self, created_at), fields(user_id = %user_id, feature = %feature_type))]
    pub async fn record_at(&self, user_id: &str, feature_type: &str, created_at: DateTime<Utc>) -> bool {
        if user_id.is_empty() {
            warn!("Refusing to record usage without a user id");
            return false;
        }

        let event = UsageEvent::new(user_id, feature_type, created_at);
        match self.usage.insert(&event).await {
            Ok(()) => {
                debug!(event_id = %event.id, "Usage recorded");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to record usage");
                false
            }
        }
    }

    /// Today's usage per feature and in total
    ///
    /// Informational only: `remaining` uses the free ceiling for every tier.
    /// Returns `None` for an empty user id or a storage failure.
    pub async fn daily_stats(&self, user_id: &str) -> Option<DailyStats> {
        self.daily_stats_at(user_id, Local::now()).await
    }

    /// [`UsageLimiter::daily_stats`] against an explicit clock reading
    #[instrument(skip(self, now), fields(user_id = %user_id))]
    pub async fn daily_stats_at(&self, user_id: &str, now: DateTime<Local>) -> Option<DailyStats> {
        if user_id.is_empty() {
            return None;
        }

        match self
            .usage
            .features_since(user_id, window::start_of_day(&now))
            .await
        {
            Ok(features) => Some(DailyStats::from_features(features, self.daily_limit())),
            Err(e) => {
                error!(error = %e, "Failed to load daily stats");
                None
            }
        }
    }

    /// Check and take one unit of quota in a single step
    ///
    /// On stores with atomic counters the event is stored immediately, so
    /// concurrent callers can never overshoot the limit. Other stores fall
    /// back to [`UsageLimiter::check`] and record on commit.
    pub async fn reserve(&self, user_id: &str, feature_type: &str) -> Reservation {
        self.reserve_at(user_id, feature_type, Local::now()).await
    }

    /// [`UsageLimiter::reserve`] against an explicit clock reading
    #[instrument(skip(self, now), fields(user_id = %user_id, feature = %feature_type))]
    pub async fn reserve_at(&self, user_id: &str, feature_type: &str, now: DateTime<Local>) -> Reservation {
        if user_id.is_empty() {
            return Reservation::denied(self.unauthenticated());
        }

        let now_utc = now.with_timezone(&Utc);
        let record_on_commit = Pending::Record {
            user_id: user_id.to_string(),
            feature_type: feature_type.to_string(),
        };

        match self.is_pro(user_id, now_utc).await {
            Ok(true) => {
                return Reservation {
                    decision: Decision::unlimited(),
                    pending: record_on_commit,
                };
            }
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "Subscription lookup failed, denying");
                return Reservation::denied(self.storage_failure(e.to_string()));
            }
        }

        let limit = self.daily_limit();
        let reset_at = window::next_reset(&now);
        let event = UsageEvent::new(user_id, feature_type, now_utc);

        match self
            .usage
            .consume(&event, window::start_of_day(&now), limit)
            .await
        {
            Ok(Some(Consumption::Granted { used })) => {
                debug!(used, event_id = %event.id, "Quota consumed atomically");
                let mut decision = Decision::capped(used, limit, reset_at);
                decision.allowed = true;
                Reservation {
                    decision,
                    pending: Pending::Consumed(event),
                }
            }
            Ok(Some(Consumption::Denied { used })) => {
                debug!(used, "Quota exhausted");
                Reservation::denied(Decision::capped(used, limit, reset_at))
            }
            Ok(None) => {
                let decision = self.capped_decision(user_id, feature_type, now).await;
                if decision.allowed {
                    Reservation {
                        decision,
                        pending: record_on_commit,
                    }
                } else {
                    Reservation::denied(decision)
                }
            }
            Err(e) => {
                error!(error = %e, "Atomic consume failed, denying");
                Reservation::denied(self.storage_failure(e.to_string()))
            }
        }
    }

    /// Finalize a reservation after the metered work succeeded
    ///
    /// Returns whether the invocation is on record.
    pub async fn commit(&self, reservation: Reservation) -> bool {
        match reservation.pending {
            Pending::Nothing => false,
            Pending::Record {
                user_id,
                feature_type,
            } => self.record(&user_id, &feature_type).await,
            Pending::Consumed(_) => true,
        }
    }

    /// Give back a reservation whose metered work failed
    pub async fn release(&self, reservation: Reservation) {
        if let Pending::Consumed(event) = reservation.pending {
            if let Err(e) = self.usage.retract(&event).await {
                warn!(
                    error = %e,
                    user_id = %event.user_id,
                    feature = %event.feature_type,
                    "Failed to release reserved quota"
                );
            }
        }
    }

    async fn is_pro(&self, user_id: &str, now: DateTime<Utc>) -> StoreResult<bool> {
        let record = self.subscriptions.subscription(user_id).await?;
        Ok(record.map(|r| r.is_pro_at(now)).unwrap_or(false))
    }

    fn unauthenticated(&self) -> Decision {
        Decision::failed(
            DecisionErrorKind::Unauthenticated,
            "User ID required",
            self.daily_limit(),
        )
    }

    fn storage_failure(&self, message: String) -> Decision {
        Decision::failed(
            DecisionErrorKind::StorageUnavailable,
            message,
            self.daily_limit(),
        )
    }
}
