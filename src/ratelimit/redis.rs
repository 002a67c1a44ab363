//! Redis reservation store.
//!
//! Each operation runs as one server-side Lua script, which is what makes
//! reserve/cancel/cleanup indivisible across processes. The window is a
//! sorted set scored by epoch-ms; the hard block is a plain key with a PX
//! expiry, where no expiry at all means blocked forever.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;

use crate::error::Result;

use super::store::{ReservationStore, ReserveArgs, WindowReply};

/// Ages out expired entries, consults the block marker, then admits or
/// rejects. Engages the hard block only on a rejected reservation, never on
/// a probe. Replies `(usage, limit, token-or-empty, reset)`, where `reset`
/// is an absolute epoch-ms instant and `0` means blocked forever.
const RESERVE_SCRIPT: &str = r#"
local window = KEYS[1]
local block = KEYS[2]
local now = tonumber(ARGV[1])
local interval = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local reserve = tonumber(ARGV[4]) == 1
local token = ARGV[5]
local blockInterval = tonumber(ARGV[6])

if interval > 0 then
  redis.call('ZREMRANGEBYSCORE', window, '-inf', now - interval)
end

local usage = redis.call('ZCARD', window)

local ttl = redis.call('PTTL', block)
if ttl == -1 then
  return { usage, limit, '', 0 }
end
if ttl > 0 then
  return { usage, limit, '', now + ttl }
end

if usage < limit then
  if not reserve then
    return { usage, limit, '', 0 }
  end
  redis.call('ZADD', window, now, token)
  if interval > 0 then
    redis.call('PEXPIRE', window, interval)
  end
  return { usage + 1, limit, token, 0 }
end

if reserve then
  if blockInterval > 0 then
    redis.call('SET', block, '1', 'PX', blockInterval)
    return { usage, limit, '', now + blockInterval }
  end
  redis.call('SET', block, '1')
  return { usage, limit, '', 0 }
end

local reset = 0
if interval > 0 then
  local oldest = redis.call('ZRANGE', window, 0, 0, 'WITHSCORES')
  if oldest[2] then
    reset = tonumber(oldest[2]) + interval
    if reset <= now then
      reset = now + 1
    end
  end
end
return { usage, limit, '', reset }
"#;

const CANCEL_SCRIPT: &str = r#"
return redis.call('ZREM', KEYS[1], ARGV[1])
"#;

/// Collects the tokens recorded under the primary window, removes them from
/// every extra key, then drops the window and its block marker.
const CLEANUP_SCRIPT: &str = r#"
local members = redis.call('ZRANGE', KEYS[1], 0, -1)
if #members > 0 then
  for i = 3, #KEYS do
    redis.call('ZREM', KEYS[i], unpack(members))
  end
end
redis.call('DEL', KEYS[1], KEYS[2])
return redis.status_reply('OK')
"#;

/// Reservation store backed by Redis server-side scripts.
pub struct RedisReservationStore {
    conn: ConnectionManager,
    reserve: Script,
    cancel: Script,
    cleanup: Script,
}

impl RedisReservationStore {
    /// Create a store over an established connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            reserve: Script::new(RESERVE_SCRIPT),
            cancel: Script::new(CANCEL_SCRIPT),
            cleanup: Script::new(CLEANUP_SCRIPT),
        }
    }

    /// Connect to Redis and create a store.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl ReservationStore for RedisReservationStore {
    async fn reserve(
        &self,
        key: &str,
        block_key: &str,
        args: ReserveArgs<'_>,
    ) -> Result<WindowReply> {
        let mut conn = self.conn.clone();

        let (usage, limit, token, reset_ms): (u32, u32, String, u64) = self
            .reserve
            .key(key)
            .key(block_key)
            .arg(args.now_ms)
            .arg(args.interval_ms)
            .arg(args.limit)
            .arg(args.reserve as u8)
            .arg(args.token)
            .arg(args.block_interval_ms)
            .invoke_async(&mut conn)
            .await?;

        Ok(WindowReply {
            usage,
            limit,
            token: (!token.is_empty()).then_some(token),
            reset_ms,
        })
    }

    async fn cancel(&self, key: &str, token: &str) -> Result<()> {
        let mut conn = self.conn.clone();

        let _removed: u32 = self
            .cancel
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn cleanup(&self, key: &str, block_key: &str, extra_keys: &[&str]) -> Result<()> {
        let mut conn = self.conn.clone();

        let mut invocation = self.cleanup.prepare_invoke();
        invocation.key(key).key(block_key);
        for extra in extra_keys {
            invocation.key(*extra);
        }

        let _: () = invocation.invoke_async(&mut conn).await?;
        Ok(())
    }
}
