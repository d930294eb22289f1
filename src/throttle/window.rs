//! Fixed-window request counting.
//!
//! A window opens on the first request for a key and hard-resets once its
//! length has elapsed; there is no sliding or token-bucket smoothing.
//! Requests past the ceiling are still counted so over-limit traffic stays
//! visible in the totals.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{shard_index, SHARD_COUNT};

#[derive(Clone, Copy, Debug)]
struct WindowEntry {
    count: u32,
    reset_at: Instant,
}

/// Outcome of counting one request against a key's window.
#[derive(Clone, Copy, Debug)]
pub struct WindowDecision {
    pub allowed: bool,
    /// Requests left before the ceiling; zero once at or over it.
    pub remaining: u32,
    pub reset_at: Instant,
    /// Total requests observed this window, including over-limit ones.
    pub total: u32,
}

impl WindowDecision {
    /// Seconds until the window resets, rounded up. Used for `Retry-After`.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        let remaining = self.reset_at.saturating_duration_since(Instant::now());
        let secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Sharded fixed-window counter keyed by arbitrary strings.
pub struct FixedWindowLimiter {
    shards: Vec<Mutex<HashMap<String, WindowEntry>>>,
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Count a request against `key`. The first request for a new or expired
    /// key opens a fresh window of `window` starting now.
    pub fn increment(&self, key: &str, window: Duration, max_requests: u32) -> WindowDecision {
        self.increment_at(key, window, max_requests, Instant::now())
    }

    fn increment_at(
        &self,
        key: &str,
        window: Duration,
        max_requests: u32,
        now: Instant,
    ) -> WindowDecision {
        let mut shard = self.shards[shard_index(key)]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let entry = shard
            .entry(key.to_string())
            .and_modify(|entry| {
                if now >= entry.reset_at {
                    entry.count = 1;
                    entry.reset_at = now + window;
                } else {
                    entry.count = entry.count.saturating_add(1);
                }
            })
            .or_insert(WindowEntry {
                count: 1,
                reset_at: now + window,
            });

        WindowDecision {
            allowed: entry.count <= max_requests,
            remaining: max_requests.saturating_sub(entry.count),
            reset_at: entry.reset_at,
            total: entry.count,
        }
    }

    /// Drop expired windows. Runs shard by shard so live increments on other
    /// shards proceed untouched.
    pub fn sweep(&self) {
        let now = Instant::now();
        for shard in &self.shards {
            let mut shard = shard.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            shard.retain(|_, entry| now < entry.reset_at);
        }
    }

    /// Number of live keys across all shards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .len()
            })
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
