use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// PostgreSQL connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection string, usually `{{ env.DATABASE_URL }}`
    pub url: SecretString,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout", with = "crate::duration")]
    pub connect_timeout: Duration,
}

/// Redis server used for caching and shared rate-limit counters
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    pub url: Url,
}

const fn default_max_connections() -> u32 {
    10
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}
