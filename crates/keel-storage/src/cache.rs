use std::time::Duration;

use async_trait::async_trait;
use keel_config::RedisConfig;
use keel_core::HealthCheck;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::sync::OnceCell;

/// Redis handle shared by caches and other fast-path state
#[derive(Clone)]
pub struct Cache {
    client: redis::Client,
    connection: std::sync::Arc<OnceCell<ConnectionManager>>,
}

impl Cache {
    /// Create a handle; nothing is connected until first use
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not a valid redis URL
    pub fn new(config: &RedisConfig) -> anyhow::Result<Self> {
        let client =
            redis::Client::open(config.url.as_str()).map_err(|e| anyhow::anyhow!("invalid redis configuration: {e}"))?;

        Ok(Self {
            client,
            connection: std::sync::Arc::new(OnceCell::new()),
        })
    }

    /// Multiplexed connection that reconnects on its own
    ///
    /// # Errors
    ///
    /// Returns an error if the first connection attempt fails
    pub async fn connection(&self) -> redis::RedisResult<ConnectionManager> {
        self.connection
            .get_or_try_init(|| {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(2)
                    .set_connection_timeout(Duration::from_secs(1));
                tracing::debug!("opening redis connection");
                ConnectionManager::new_with_config(self.client.clone(), config)
            })
            .await
            .cloned()
    }

    /// Issue `PING` and expect `PONG`
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or answers unexpectedly
    pub async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.connection().await?;
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;

        if reply != "PONG" {
            anyhow::bail!("unexpected PING reply: {reply}");
        }

        Ok(())
    }
}

#[async_trait]
impl HealthCheck for Cache {
    async fn check(&self) -> anyhow::Result<()> {
        self.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_scheme() {
        let config = RedisConfig {
            url: "http://127.0.0.1:6379".parse().unwrap(),
        };
        assert!(Cache::new(&config).is_err());
    }

    #[tokio::test]
    async fn unreachable_server_fails_health_check() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".parse().unwrap(),
        };
        let cache = Cache::new(&config).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), cache.check()).await;
        assert!(matches!(outcome, Ok(Err(_)) | Err(_)));
    }
}
