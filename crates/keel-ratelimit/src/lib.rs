#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod error;
pub mod storage;

pub use error::RateLimitError;

use keel_config::{RateLimitConfig, RateLimitStorage};

use crate::storage::{memory::MemoryLimiter, redis::RedisLimiter};

/// Fixed-window request limiter keyed by client identity
pub enum RequestLimiter {
    Memory(MemoryLimiter),
    Redis(RedisLimiter),
}

impl RequestLimiter {
    /// Create from configuration
    ///
    /// `redis_url` is only used by the Redis backend.
    pub fn new(config: &RateLimitConfig, redis_url: &str) -> Result<Self, RateLimitError> {
        match config.storage {
            RateLimitStorage::Memory => Ok(Self::Memory(MemoryLimiter::new(config.requests, config.window)?)),
            RateLimitStorage::Redis => Ok(Self::Redis(RedisLimiter::new(redis_url, config.requests, config.window)?)),
        }
    }

    /// Count a request for `key`
    pub async fn check(&self, key: &str) -> Result<(), RateLimitError> {
        match self {
            Self::Memory(limiter) => limiter.check(key),
            Self::Redis(limiter) => limiter.check(key).await,
        }
    }
}
