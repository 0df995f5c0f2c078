use std::time::Duration;

use serde::Deserialize;

/// Fixed-window request limit keyed by client address
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Requests allowed per window
    #[serde(default = "default_requests")]
    pub requests: u32,
    #[serde(default = "default_window", with = "crate::duration")]
    pub window: Duration,
    #[serde(default)]
    pub storage: RateLimitStorage,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests: default_requests(),
            window: default_window(),
            storage: RateLimitStorage::default(),
        }
    }
}

/// Where window counters live
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateLimitStorage {
    /// Process-local counters (single instance only)
    #[default]
    Memory,
    /// Shared counters on the `[redis]` server
    Redis,
}

const fn default_enabled() -> bool {
    true
}

const fn default_requests() -> u32 {
    20
}

const fn default_window() -> Duration {
    Duration::from_secs(1)
}
