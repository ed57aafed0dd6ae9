//! Redis-backed fixed window.
//!
//! Check-and-increment runs as one Lua script so concurrent reservations
//! from different processes can neither overshoot the cap nor lose an
//! increment. `PEXPIRE` is only issued when the key carries no TTL, i.e. on
//! the first increment of a window.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::coordinator::{RateLimitCoordinator, RateLimitError};

const RESERVE_SCRIPT: &str = r#"
local used = tonumber(redis.call('GET', KEYS[1]) or '0')
local cost = tonumber(ARGV[1])
local cap = tonumber(ARGV[2])
if used + cost > cap then
    return 0
end
redis.call('INCRBY', KEYS[1], cost)
if redis.call('PTTL', KEYS[1]) < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[3])
end
return 1
"#;

pub struct RedisWindow {
    client: redis::Client,
    script: redis::Script,
    key: String,
    cap: u64,
    window_ms: u64,
    /// Cached connection; dropped on any error so the next call reconnects.
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisWindow {
    /// Parse `url` and prepare the window. No connection is made yet.
    pub fn new(url: &str, key: &str, cap: u64, window: Duration) -> Result<Self, RateLimitError> {
        let client =
            redis::Client::open(url).map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        info!(%key, cap, window_ms = window.as_millis() as u64, "rate-limit window configured");
        Ok(Self {
            client,
            script: redis::Script::new(RESERVE_SCRIPT),
            key: key.to_string(),
            cap,
            window_ms: window.as_millis() as u64,
            conn: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, RateLimitError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| RateLimitError::Unavailable(e.to_string()))?;
        debug!("rate-limit store connected");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn drop_connection(&self) {
        self.conn.lock().await.take();
    }
}

#[async_trait]
impl RateLimitCoordinator for RedisWindow {
    async fn reserve(&self, cost: u64) -> Result<bool, RateLimitError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<i64> = self
            .script
            .key(&self.key)
            .arg(cost)
            .arg(self.cap)
            .arg(self.window_ms)
            .invoke_async(&mut conn)
            .await;

        match result {
            Ok(granted) => {
                debug!(cost, granted = granted == 1, "rate-limit reservation");
                Ok(granted == 1)
            }
            Err(e) => {
                warn!(error = %e, "rate-limit reservation failed");
                self.drop_connection().await;
                Err(RateLimitError::Command(e.to_string()))
            }
        }
    }

    async fn headroom(&self) -> Result<u64, RateLimitError> {
        let mut conn = self.connection().await?;
        let used: redis::RedisResult<Option<u64>> = conn.get(&self.key).await;
        match used {
            Ok(used) => Ok(self.cap.saturating_sub(used.unwrap_or(0))),
            Err(e) => {
                self.drop_connection().await;
                Err(RateLimitError::Command(e.to_string()))
            }
        }
    }

    async fn close(&self) {
        self.drop_connection().await;
        info!("rate-limit store connection released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_is_rejected() {
        assert!(RedisWindow::new("not a url", "k", 10, Duration::from_secs(60)).is_err());
    }

    #[tokio::test]
    async fn unreachable_store_reports_unavailable() {
        let window =
            RedisWindow::new("redis://127.0.0.1:1", "k", 10, Duration::from_secs(60)).unwrap();
        assert!(matches!(
            window.headroom().await,
            Err(RateLimitError::Unavailable(_))
        ));
        assert!(window.reserve(1).await.is_err());
    }

    /// A window against the Redis at `REDIS_URL`, with its key cleared.
    async fn live_window(key: &str, cap: u64) -> Option<RedisWindow> {
        let url = std::env::var("REDIS_URL").ok()?;
        let window = RedisWindow::new(&url, key, cap, Duration::from_secs(60)).unwrap();
        let mut conn = window.connection().await.unwrap();
        let _: () = conn.del(key).await.unwrap();
        Some(window)
    }

    async fn pttl(window: &RedisWindow) -> i64 {
        let mut conn = window.connection().await.unwrap();
        redis::cmd("PTTL")
            .arg(&window.key)
            .query_async(&mut conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn later_reservations_do_not_extend_the_window() {
        let key = format!("jobscale:test:ttl:{}", std::process::id());
        let Some(window) = live_window(&key, 3).await else {
            return;
        };

        assert!(window.reserve(2).await.unwrap());
        let first = pttl(&window).await;
        assert!(first > 0 && first <= 60_000);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(window.reserve(1).await.unwrap());
        let second = pttl(&window).await;
        assert!(second < first, "expiry was refreshed: {first} -> {second}");

        assert!(!window.reserve(1).await.unwrap());
        assert_eq!(window.headroom().await.unwrap(), 0);

        let mut conn = window.connection().await.unwrap();
        let _: () = conn.del(&key).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn concurrent_reservations_never_overshoot_cap() {
        let key = format!("jobscale:test:cap:{}", std::process::id());
        let Some(window) = live_window(&key, 10).await else {
            return;
        };
        let window = std::sync::Arc::new(window);

        let mut handles = Vec::new();
        for _ in 0..40 {
            let w = std::sync::Arc::clone(&window);
            handles.push(tokio::spawn(async move { w.reserve(1).await.unwrap() }));
        }
        let mut granted = 0;
        for h in handles {
            if h.await.unwrap() {
                granted += 1;
            }
        }

        assert_eq!(granted, 10);
        assert_eq!(window.headroom().await.unwrap(), 0);

        let mut conn = window.connection().await.unwrap();
        let _: () = conn.del(&key).await.unwrap();
    }
}
