use std::time::Duration;

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::sync::OnceCell;

use crate::error::RateLimitError;

const KEY_PREFIX: &str = "keel:ratelimit:";

/// Redis-backed fixed-window counter shared by every instance
///
/// Each request runs `INCR` and `EXPIRE .. NX` in one transaction. The key
/// disappearing ends the window. Requires Redis 7 or newer.
pub struct RedisLimiter {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    max_requests: u32,
    window: Duration,
}

impl RedisLimiter {
    /// Create a limiter; the connection is opened on first use
    pub fn new(url: &str, max_requests: u32, window: Duration) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(url).map_err(|e| RateLimitError::Redis(format!("invalid redis url: {e}")))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            max_requests,
            window,
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, RateLimitError> {
        self.connection
            .get_or_try_init(|| {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(2)
                    .set_connection_timeout(Duration::from_secs(1));
                ConnectionManager::new_with_config(self.client.clone(), config)
            })
            .await
            .cloned()
            .map_err(|e| RateLimitError::Redis(format!("failed to get connection: {e}")))
    }

    /// Count a request for `key` and reject it once the window is full
    pub async fn check(&self, key: &str) -> Result<(), RateLimitError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;

        let rate_key = window_key(key);
        let window_secs = i64::try_from(self.window.as_secs().max(1)).unwrap_or(i64::MAX);

        let (count,): (u32,) = counting_pipeline(&rate_key, window_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| RateLimitError::Redis(format!("counter update failed: {e}")))?;

        if count > self.max_requests {
            let ttl: i64 = conn
                .ttl(&rate_key)
                .await
                .map_err(|e| RateLimitError::Redis(format!("TTL failed: {e}")))?;

            return Err(RateLimitError::Exceeded {
                retry_after: u64::try_from(ttl.max(1)).unwrap_or(1),
            });
        }

        Ok(())
    }
}

fn window_key(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// `MULTI; INCR key; EXPIRE key secs NX; EXEC`
///
/// `NX` only sets a TTL on a counter lacking one, so the window is fixed from
/// its first request.
fn counting_pipeline(rate_key: &str, window_secs: i64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("INCR")
        .arg(rate_key)
        .cmd("EXPIRE")
        .arg(rate_key)
        .arg(window_secs)
        .arg("NX")
        .ignore();
    pipe
}
