use std::{net::SocketAddr, time::Duration};

use serde::Deserialize;

use crate::{cors::CorsConfig, rate_limit::RateLimitConfig};

/// HTTP listener and request pipeline settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,
    /// Deployment name reported by `/status`
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_timeout", with = "crate::duration")]
    pub read_timeout: Duration,
    #[serde(default = "default_timeout", with = "crate::duration")]
    pub write_timeout: Duration,
    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl ServerConfig {
    /// Overall deadline for a single request
    pub fn request_deadline(&self) -> Duration {
        self.read_timeout + self.write_timeout
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            environment: default_environment(),
            read_timeout: default_timeout(),
            write_timeout: default_timeout(),
            body_limit: default_body_limit(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_environment() -> String {
    "development".to_string()
}

const fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

const fn default_body_limit() -> usize {
    2 * 1024 * 1024
}
