//! Pending MFA challenges.
//!
//! A successful password check for an MFA-enrolled account does not mint a
//! session. It parks a single-use challenge here and hands the client an
//! opaque id; the session only exists once the second factor verifies. The
//! map is bounded by TTL: inserts sweep expired entries, and `take` removes
//! the entry whether or not it is still live.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// What the password step established, carried across to the MFA step.
#[derive(Clone, Debug)]
pub struct MfaChallenge {
    pub user_id: Uuid,
    pub remember_me: bool,
    created_at: Instant,
}

pub struct MfaChallengeStore {
    ttl: Duration,
    challenges: Mutex<HashMap<Uuid, MfaChallenge>>,
}

impl MfaChallengeStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            challenges: Mutex::new(HashMap::new()),
        }
    }

    /// Park a challenge and return its id.
    pub async fn issue(&self, user_id: Uuid, remember_me: bool) -> Uuid {
        let challenge_id = Uuid::new_v4();
        let mut challenges = self.challenges.lock().await;
        challenges.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        challenges.insert(
            challenge_id,
            MfaChallenge {
                user_id,
                remember_me,
                created_at: Instant::now(),
            },
        );
        challenge_id
    }

    /// Look at a live challenge without consuming it. Used while the code is
    /// being verified so a wrong code leaves the challenge in place for the
    /// remaining attempts.
    pub async fn peek(&self, challenge_id: Uuid) -> Option<MfaChallenge> {
        let challenges = self.challenges.lock().await;
        challenges
            .get(&challenge_id)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .cloned()
    }

    /// Remove a challenge, returning it if it was still live. Called on
    /// success and on budget exhaustion; either way the id is dead after.
    pub async fn take(&self, challenge_id: Uuid) -> Option<MfaChallenge> {
        let mut challenges = self.challenges.lock().await;
        challenges
            .remove(&challenge_id)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
    }

    /// Drop expired entries. Called by the periodic sweeper.
    pub async fn sweep(&self) {
        let mut challenges = self.challenges.lock().await;
        challenges.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
    }

    pub async fn len(&self) -> usize {
        self.challenges.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
