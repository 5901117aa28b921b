//! Durable sliding-window counter backed by a shared Redis store.
//!
//! Each key holds one sorted-set member per admitted event, scored by its
//! unix-millisecond timestamp. Expiry, count, refusal and admission run as
//! a single server-side Lua script, so concurrent callers for the same key
//! serialize inside the store and the limit cannot be oversubscribed by a
//! read-then-write race.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tracing::debug;

use super::counter::{Acquisition, WindowCounter};
use crate::error::Result;

/// The atomic admission script.
///
/// KEYS[1] = counting key; ARGV = window_ms, limit, now_ms.
/// Returns {allowed, retry_after_ms, remaining}.
///
/// A companion `<key>:seq` counter gives every member a strictly
/// increasing tiebreaker, so two events in the same millisecond remain
/// distinct sorted-set members and both count.
const ACQUIRE_SCRIPT: &str = r#"
local key = KEYS[1]
local window_ms = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
local now_ms = tonumber(ARGV[3])
local seq_key = key .. ':seq'

redis.call('ZREMRANGEBYSCORE', key, '-inf', now_ms - window_ms)
local count = redis.call('ZCARD', key)

if count >= limit then
    local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
    local retry_after = window_ms
    if oldest[2] then
        retry_after = window_ms - (now_ms - tonumber(oldest[2]))
        if retry_after < 0 then
            retry_after = 0
        end
    end
    return {0, retry_after, 0}
end

local seq = redis.call('INCR', seq_key)
redis.call('ZADD', key, now_ms, now_ms .. '-' .. seq)
redis.call('PEXPIRE', key, window_ms)
redis.call('PEXPIRE', seq_key, window_ms)
return {1, 0, limit - count - 1}
"#;

/// Shared-store counter used by every process of the deployment.
pub struct RedisWindowStore {
    connection: ConnectionManager,
    script: Script,
}

impl RedisWindowStore {
    /// Connect to the shared store and verify it responds.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        // Test connection
        let mut conn = connection.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;

        debug!("Connected to shared rate limit store");

        Ok(Self {
            connection,
            script: Script::new(ACQUIRE_SCRIPT),
        })
    }
}

#[async_trait]
impl WindowCounter for RedisWindowStore {
    async fn try_acquire(
        &self,
        key: &str,
        window_ms: u64,
        limit: u32,
        now_ms: u64,
    ) -> Result<Acquisition> {
        let mut conn = self.connection.clone();

        let (allowed, retry_after_ms, remaining): (i64, i64, i64) = self
            .script
            .key(key)
            .arg(window_ms)
            .arg(limit)
            .arg(now_ms)
            .invoke_async(&mut conn)
            .await?;

        if allowed == 1 {
            Ok(Acquisition::allowed(remaining.max(0) as u32))
        } else {
            Ok(Acquisition::blocked(retry_after_ms.max(0) as u64))
        }
    }
}
