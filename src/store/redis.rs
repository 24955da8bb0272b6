//! Redis usage event store
//!
//! Events live in one sorted set per user, scored by creation time in
//! milliseconds, with members `{feature}|{event_id}`. Atomic consumption runs
//! as a Lua script so the count and the insert cannot interleave with other
//! callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::{debug, instrument};

use crate::{
    quota::models::UsageEvent,
    store::{Consumption, StoreResult, UsageStore},
};

/// Count members for one feature since a score and add the new member only
/// while the count is below the limit.
///
/// The feature of a member is everything before its last `|`, matching
/// [`keys::feature_of`].
///
/// KEYS[1] = user key
/// ARGV = since_ms, feature, limit, created_ms, event_id, ttl_seconds
/// Returns {granted (0|1), used}
const CONSUME_SCRIPT: &str = r#"
local members = redis.call('ZRANGEBYSCORE', KEYS[1], ARGV[1], '+inf')
local used = 0
for _, member in ipairs(members) do
  if string.match(member, '^(.*)|[^|]*$') == ARGV[2] then
    used = used + 1
  end
end
if used >= tonumber(ARGV[3]) then
  return {0, used}
end
redis.call('ZADD', KEYS[1], ARGV[4], ARGV[2] .. '|' .. ARGV[5])
local ttl = tonumber(ARGV[6])
if ttl > 0 then
  redis.call('EXPIRE', KEYS[1], ttl)
end
return {1, used + 1}
"#;

/// Redis-backed usage store
pub struct RedisUsageStore {
    conn: redis::aio::ConnectionManager,
    retention_seconds: u64,
    consume_script: redis::Script,
}

impl RedisUsageStore {
    /// Create a new store; `retention_days == 0` keeps events forever
    pub fn new(conn: redis::aio::ConnectionManager, retention_days: u64) -> Self {
        Self {
            conn,
            retention_seconds: retention_days * 24 * 60 * 60,
            consume_script: redis::Script::new(CONSUME_SCRIPT),
        }
    }
}

/// Key and member layout
pub mod keys {
    /// Sorted set holding every usage event for a user
    pub fn user_usage(user_id: &str) -> String {
        format!("usage_gate:usage:{}", user_id)
    }

    /// Sorted set member for one event
    pub fn member(feature_type: &str, event_id: &str) -> String {
        format!("{}|{}", feature_type, event_id)
    }

    /// Feature key of a member, if well formed
    pub fn feature_of(member: &str) -> Option<&str> {
        member.rsplit_once('|').map(|(feature, _)| feature)
    }
}

impl RedisUsageStore {
    async fn members_since(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrangebyscore(keys::user_usage(user_id), since.timestamp_millis(), "+inf")
            .await?;
        Ok(members)
    }
}

#[async_trait]
impl UsageStore for RedisUsageStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self, event), fields(user_id = %event.user_id, feature = %event.feature_type))]
    async fn insert(&self, event: &UsageEvent) -> StoreResult<()> {
        let key = keys::user_usage(&event.user_id);
        let member = keys::member(&event.feature_type, &event.id.to_string());
        let mut conn = self.conn.clone();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .zadd(&key, member, event.created_at.timestamp_millis())
            .ignore();
        if self.retention_seconds > 0 {
            pipe.expire(&key, self.retention_seconds as i64).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;

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
        let members = self.members_since(user_id, since).await?;
        Ok(members
            .iter()
            .filter(|m| keys::feature_of(m) == Some(feature_type))
            .count() as u64)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn features_since(&self, user_id: &str, since: DateTime<Utc>) -> StoreResult<Vec<String>> {
        let members = self.members_since(user_id, since).await?;
        Ok(members
            .iter()
            .filter_map(|m| keys::feature_of(m).map(str::to_string))
            .collect())
    }

    #[instrument(skip(self, event), fields(user_id = %event.user_id, feature = %event.feature_type))]
    async fn consume(
        &self,
        event: &UsageEvent,
        since: DateTime<Utc>,
        limit: u64,
    ) -> StoreResult<Option<Consumption>> {
        let mut conn = self.conn.clone();
        let (granted, used): (i64, i64) = self
            .consume_script
            .key(keys::user_usage(&event.user_id))
            .arg(since.timestamp_millis())
            .arg(&event.feature_type)
            .arg(limit)
            .arg(event.created_at.timestamp_millis())
            .arg(event.id.to_string())
            .arg(self.retention_seconds)
            .invoke_async(&mut conn)
            .await?;

        let used = used.max(0) as u64;
        debug!(granted = granted == 1, used, "Consume script finished");

        Ok(Some(if granted == 1 {
            Consumption::Granted { used }
        } else {
            Consumption::Denied { used }
        }))
    }

    #[instrument(skip(self, event), fields(user_id = %event.user_id, feature = %event.feature_type))]
    async fn retract(&self, event: &UsageEvent) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .zrem(
                keys::user_usage(&event.user_id),
                keys::member(&event.feature_type, &event.id.to_string()),
            )
            .await?;
        Ok(())
    }

    async fn health(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
