use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::error::RateLimitError;

/// Checks between sweeps of expired windows
const PURGE_EVERY: u64 = 4096;

/// In-memory fixed-window counter
///
/// Each key lives in its own `DashMap` shard entry, so an increment only
/// locks that shard. An expired window is reset in place by the next request
/// for that key.
pub struct MemoryLimiter {
    windows: DashMap<String, Window>,
    max_requests: u32,
    window: Duration,
    checks: AtomicU64,
}

struct Window {
    started: Instant,
    count: u32,
}

impl MemoryLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, RateLimitError> {
        if max_requests == 0 {
            return Err(RateLimitError::Config("max_requests must be > 0".to_string()));
        }
        if window.is_zero() {
            return Err(RateLimitError::Config("rate limit window must be > 0".to_string()));
        }

        Ok(Self {
            windows: DashMap::new(),
            max_requests,
            window,
            checks: AtomicU64::new(0),
        })
    }

    /// Count a request for `key` and reject it once the window is full
    pub fn check(&self, key: &str) -> Result<(), RateLimitError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), RateLimitError> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            self.purge(now);
        }

        let mut entry = self
            .windows
            .entry(key.to_owned())
            .or_insert_with(|| Window { started: now, count: 0 });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            let remaining = self.window.saturating_sub(now.saturating_duration_since(entry.started));
            return Err(RateLimitError::Exceeded {
                retry_after: (remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)).max(1),
            });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop windows that ended, so idle clients do not accumulate
    fn purge(&self, now: Instant) {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.saturating_duration_since(window.started) < self.window);
        tracing::trace!(removed = before.saturating_sub(self.windows.len()), "purged rate limit windows");
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
