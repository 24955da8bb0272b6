//! In-memory store implementation
//!
//! Holds subscription records and usage events in process memory. Used by
//! tests in place of Redis and Supabase.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    quota::models::{SubscriptionRecord, UsageEvent},
    store::{Consumption, StoreError, StoreResult, SubscriptionStore, UsageStore},
};

/// In-memory store for subscriptions and usage events
///
/// # Thread Safety
///
/// A single mutex guards the event log, so `consume` is atomic with respect
/// to every other call on the same store.
#[derive(Default)]
pub struct InMemoryStore {
    subscriptions: Mutex<HashMap<String, SubscriptionRecord>>,
    events: Mutex<Vec<UsageEvent>>,
    unavailable: AtomicBool,
    calls: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a subscription record
    pub fn put_subscription(&self, record: SubscriptionRecord) {
        self.subscriptions()
            .insert(record.user_id.clone(), record);
    }

    /// Append an event with an explicit timestamp, bypassing call accounting
    pub fn seed_event(&self, event: UsageEvent) {
        self.events().push(event);
    }

    /// Number of stored events
    pub fn event_count(&self) -> usize {
        self.events().len()
    }

    /// Number of trait calls served (including failed ones)
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every subsequent trait call fail with `StoreError::Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn enter(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    // A poisoned lock only means another test thread panicked mid-write;
    // the data is still usable.
    fn subscriptions(&self) -> MutexGuard<'_, HashMap<String, SubscriptionRecord>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn events(&self) -> MutexGuard<'_, Vec<UsageEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn count_matching(events: &[UsageEvent], user_id: &str, feature_type: &str, since: DateTime<Utc>) -> u64 {
    events
        .iter()
        .filter(|e| e.user_id == user_id && e.feature_type == feature_type && e.created_at >= since)
        .count() as u64
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn subscription(&self, user_id: &str) -> StoreResult<Option<SubscriptionRecord>> {
        self.enter()?;
        Ok(self.subscriptions().get(user_id).cloned())
    }

    async fn health(&self) -> StoreResult<()> {
        self.enter()
    }
}

#[async_trait]
impl UsageStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, event: &UsageEvent) -> StoreResult<()> {
        self.enter()?;
        self.events().push(event.clone());
        Ok(())
    }

    async fn count_since(
        &self,
        user_id: &str,
        feature_type: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<u64> {
        self.enter()?;
        Ok(count_matching(&self.events(), user_id, feature_type, since))
    }

    async fn features_since(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<String>> {
        self.enter()?;
        Ok(self
            .events()
            .iter()
            .filter(|e| e.user_id == user_id && e.created_at >= since)
            .map(|e| e.feature_type.clone())
            .collect())
    }

    async fn consume(
        &self,
        event: &UsageEvent,
        since: DateTime<Utc>,
        limit: u64,
    ) -> StoreResult<Option<Consumption>> {
        self.enter()?;
        let mut events = self.events();
        let used = count_matching(&events, &event.user_id, &event.feature_type, since);

        if used >= limit {
            return Ok(Some(Consumption::Denied { used }));
        }

        events.push(event.clone());
        Ok(Some(Consumption::Granted { used: used + 1 }))
    }

    async fn retract(&self, event: &UsageEvent) -> StoreResult<()> {
        self.enter()?;
        self.events().retain(|e| e.id != event.id);
        Ok(())
    }

    async fn health(&self) -> StoreResult<()> {
        self.enter()
    }
}
