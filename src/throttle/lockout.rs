//! Failed-attempt tracking and timed account lockout.
//!
//! Entries are keyed by the submitted login identifier (normalized email),
//! whether or not an account exists for it, so the failure-recording side
//! effect is identical for unknown and known users. The table is bounded:
//! at capacity a shard first drops expired entries, then evicts its stalest
//! unlocked entry.
//!
//! Expiry is lazy: any read past `locked_until`, or past the failure window
//! for an unlocked entry, treats the entry as absent. A periodic sweep may
//! also run for memory hygiene but is not required for correctness. Clock
//! skew is not compensated; wall-clock time is assumed monotonic per
//! process.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::{shard_index, SHARD_COUNT};

#[derive(Clone, Copy, Debug)]
struct LockoutEntry {
    failures: u32,
    last_failure: Instant,
    locked_until: Option<Instant>,
}

/// Lockout thresholds.
#[derive(Clone, Copy, Debug)]
pub struct LockoutConfig {
    /// Failures before the identifier locks.
    pub max_attempts: u32,
    /// How long a lock lasts once set.
    pub lockout_duration: Duration,
    /// How long an unlocked entry survives after its last failure.
    pub failure_window: Duration,
    /// Upper bound on tracked identifiers across all shards.
    pub capacity: usize,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_duration: Duration::from_secs(30 * 60),
            failure_window: Duration::from_secs(30 * 60),
            capacity: 100_000,
        }
    }
}

/// Snapshot of an identifier's lockout state.
#[derive(Clone, Copy, Debug)]
pub struct LockoutStatus {
    pub is_locked: bool,
    pub locked_until: Option<Instant>,
    pub failed_attempts: u32,
    pub remaining_attempts: u32,
}

/// Per-identifier failure counter with timed lockout.
pub struct LockoutTracker {
    config: LockoutConfig,
    shards: Vec<Mutex<HashMap<String, LockoutEntry>>>,
}

impl LockoutTracker {
    #[must_use]
    pub fn new(config: LockoutConfig) -> Self {
        Self {
            config,
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LockoutConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Pure read of the identifier's state. An absent (or lazily expired)
    /// entry reports unlocked with the full attempt budget.
    #[must_use]
    pub fn check(&self, identifier: &str) -> LockoutStatus {
        self.check_at(identifier, Instant::now())
    }

    fn check_at(&self, identifier: &str, now: Instant) -> LockoutStatus {
        let shard = self.shards[shard_index(identifier)]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match shard.get(identifier) {
            Some(entry) if !self.expired(entry, now) => self.status_of(entry, now),
            _ => self.absent_status(),
        }
    }

    /// Record a failed attempt and return the updated state. The lock
    /// timestamp is set exactly once, at the attempt that reaches the
    /// ceiling; failures while locked never push it further out.
    pub fn record_failure(&self, identifier: &str) -> LockoutStatus {
        self.record_failure_at(identifier, Instant::now())
    }

    fn record_failure_at(&self, identifier: &str, now: Instant) -> LockoutStatus {
        let mut shard = self.shards[shard_index(identifier)]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Bounded table: reclaim space within this shard before inserting a
        // new identifier.
        if !shard.contains_key(identifier) && shard.len() >= self.shard_capacity() {
            let config = self.config;
            shard.retain(|_, entry| !expired_with(&config, entry, now));
            if shard.len() >= self.shard_capacity() {
                evict_stalest_unlocked(&mut shard);
            }
        }

        let entry = shard
            .entry(identifier.to_string())
            .and_modify(|entry| {
                if self.expired(entry, now) {
                    entry.failures = 0;
                    entry.locked_until = None;
                }
                entry.failures = entry.failures.saturating_add(1);
                entry.last_failure = now;
                if entry.failures >= self.config.max_attempts && entry.locked_until.is_none() {
                    entry.locked_until = Some(now + self.config.lockout_duration);
                }
            })
            .or_insert(LockoutEntry {
                failures: 1,
                last_failure: now,
                locked_until: None,
            });

        self.status_of(entry, now)
    }

    /// Clear the identifier's entry entirely. Called on any successful
    /// authentication.
    pub fn record_success(&self, identifier: &str) {
        let mut shard = self.shards[shard_index(identifier)]
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        shard.remove(identifier);
    }

    /// Memory-hygiene pass dropping expired entries, shard by shard.
    pub fn sweep(&self) {
        let now = Instant::now();
        let config = self.config;
        for shard in &self.shards {
            let mut shard = shard.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            shard.retain(|_, entry| !expired_with(&config, entry, now));
        }
    }

    /// Number of tracked identifiers, expired or not.
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

    fn shard_capacity(&self) -> usize {
        (self.config.capacity / SHARD_COUNT).max(1)
    }

    fn expired(&self, entry: &LockoutEntry, now: Instant) -> bool {
        expired_with(&self.config, entry, now)
    }

    fn status_of(&self, entry: &LockoutEntry, now: Instant) -> LockoutStatus {
        let is_locked = entry.locked_until.is_some_and(|until| now < until);
        LockoutStatus {
            is_locked,
            locked_until: entry.locked_until.filter(|until| now < *until),
            failed_attempts: entry.failures,
            remaining_attempts: self.config.max_attempts.saturating_sub(entry.failures),
        }
    }

    fn absent_status(&self) -> LockoutStatus {
        LockoutStatus {
            is_locked: false,
            locked_until: None,
            failed_attempts: 0,
            remaining_attempts: self.config.max_attempts,
        }
    }
}

fn expired_with(config: &LockoutConfig, entry: &LockoutEntry, now: Instant) -> bool {
    match entry.locked_until {
        Some(until) => now >= until,
        None => now.duration_since(entry.last_failure) >= config.failure_window,
    }
}

fn evict_stalest_unlocked(shard: &mut HashMap<String, LockoutEntry>) {
    let stalest = shard
        .iter()
        .filter(|(_, entry)| entry.locked_until.is_none())
        .min_by_key(|(_, entry)| entry.last_failure)
        .map(|(key, _)| key.clone());
    if let Some(key) = stalest {
        shard.remove(&key);
    }
}
