//! In-process throttling primitives: fixed-window rate limiting and
//! failed-attempt lockout.
//!
//! Both keep their state in sharded `Mutex<HashMap>` tables so concurrent
//! requests for different keys rarely contend and the read-increment-write
//! step for a single key is atomic under one shard lock. Nothing in this
//! module performs I/O or holds a lock across an `await`; callers do their
//! slow work (hashing, store round-trips) outside.
//!
//! State is process-local: a restart resets every counter and lockout. That
//! is accepted behavior for a single-process deployment; multi-instance
//! deployments substitute a shared counter store behind the same call
//! shapes.

pub mod lockout;
pub mod window;

pub use lockout::{LockoutConfig, LockoutStatus, LockoutTracker};
pub use window::{FixedWindowLimiter, WindowDecision};

use std::hash::{Hash, Hasher};

pub(crate) const SHARD_COUNT: usize = 16;

pub(crate) fn shard_index(key: &str) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % SHARD_COUNT
}

#[cfg(test)]
mod tests {
    use super::shard_index;

    #[test]
    fn shard_index_is_stable_and_bounded() {
        let first = shard_index("auth:1.2.3.4:alice@example.com");
        let second = shard_index("auth:1.2.3.4:alice@example.com");
        assert_eq!(first, second);
        assert!(first < super::SHARD_COUNT);
    }
}
