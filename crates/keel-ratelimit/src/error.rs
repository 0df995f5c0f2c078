use thiserror::Error;

/// Rate limiting errors
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// Invalid limiter settings
    #[error("rate limit configuration error: {0}")]
    Config(String),

    /// Shared counter backend failed
    #[error("redis error: {0}")]
    Redis(String),

    /// Caller used up its window
    #[error("rate limit exceeded")]
    Exceeded {
        /// Seconds until the window resets
        retry_after: u64,
    },
}
