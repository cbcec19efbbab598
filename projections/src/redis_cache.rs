//! Redis-backed [`CacheBackend`].
//!
//! Keys are used exactly as given; namespacing is the caller's concern.
//! Values are opaque bytes written with a millisecond TTL (`PSETEX`), so
//! sub-second entry lifetimes behave the same as in memory.
//!
//! Counters raised by [`CacheBackend::raise`] go through a Lua script so the
//! read, compare and write happen as one command on the server. The script
//! compares decimal strings by length and then lexically, which is exact for
//! the whole `u64` range where Lua numbers are not.

use futures::future::BoxFuture;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use seat_inventory_core::cache::{CacheBackend, CacheResult, decode_counter};
use seat_inventory_core::error::CacheError;
use std::future::Future;
use std::time::Duration;

/// KEYS[1] counter, ARGV[1] floor, ARGV[2] ttl in ms. Returns the stored value.
const RAISE_SRC: &str = r"
local current = redis.call('GET', KEYS[1])
local floor = ARGV[1]
if current and string.match(current, '^%d+$')
    and (#current > #floor or (#current == #floor and current >= floor)) then
  redis.call('PEXPIRE', KEYS[1], ARGV[2])
  return current
end
redis.call('SET', KEYS[1], floor, 'PX', ARGV[2])
return floor
";

/// `Redis` cache backend.
///
/// Cloning is cheap: clones share the same `ConnectionManager`, which
/// reconnects on its own after the server comes back.
#[derive(Clone)]
pub struct RedisCacheBackend {
    conn_manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisCacheBackend {
    /// Connect to `Redis`.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., `redis://127.0.0.1:6379`)
    /// * `op_timeout` - Upper bound for every command; slower calls count as an outage
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the URL is malformed or the
    /// initial connection fails.
    pub async fn connect(redis_url: &str, op_timeout: Duration) -> CacheResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Unavailable(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Unavailable(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("RedisCacheBackend initialized");
        Ok(Self::from_manager(conn_manager, op_timeout))
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(conn_manager: ConnectionManager, op_timeout: Duration) -> Self {
        Self {
            conn_manager,
            op_timeout,
        }
    }

    async fn bounded<T, F>(&self, command: &'static str, call: F) -> CacheResult<T>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        match tokio::time::timeout(self.op_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::Unavailable(format!("Redis {command} failed: {e}"))),
            Err(_) => Err(CacheError::Unavailable(format!(
                "Redis {command} timed out after {}ms",
                self.op_timeout.as_millis()
            ))),
        }
    }
}

/// `PSETEX` rejects 0; anything shorter than a millisecond rounds up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl CacheBackend for RedisCacheBackend {
    fn get(&self, key: &str) -> BoxFuture<'_, CacheResult<Option<Vec<u8>>>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            self.bounded("GET", async move { conn.get::<_, Option<Vec<u8>>>(&key).await })
                .await
        })
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> BoxFuture<'_, CacheResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let millis = ttl_millis(ttl);
            self.bounded("PSETEX", async move {
                conn.pset_ex::<_, _, ()>(&key, value, millis).await
            })
            .await
        })
    }

    fn evict(&self, key: &str) -> BoxFuture<'_, CacheResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            self.bounded("DEL", async move { conn.del::<_, ()>(&key).await })
                .await
        })
    }

    fn raise(&self, key: &str, floor: u64, ttl: Duration) -> BoxFuture<'_, CacheResult<u64>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut conn = self.conn_manager.clone();
            let millis = ttl_millis(ttl);
            let script = Script::new(RAISE_SRC);
            let stored: String = self
                .bounded("EVALSHA", async move {
                    script
                        .key(&key)
                        .arg(floor)
                        .arg(millis)
                        .invoke_async(&mut conn)
                        .await
                })
                .await?;
            decode_counter(stored.as_bytes())
                .ok_or_else(|| CacheError::Codec(format!("counter is not a u64: {stored}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_never_zero() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(300)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(600)), 600_000);
    }
}
