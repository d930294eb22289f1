//! Session records and the session store contract.
//!
//! Raw session tokens carry 256 bits of entropy and are returned to the
//! caller exactly once; stores only ever see the SHA-256 digest, so a stolen
//! database cannot mint cookies. Expiry is enforced by the authentication
//! core on lookup, with stale rows deleted lazily.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

/// A session record as the store keeps it, keyed by token digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token_hash: Vec<u8>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_active: bool,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Store contract the authentication core consumes. The core requests
/// creation, lookup and deletion; it never mutates stored fields besides
/// deactivating on logout.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: Session) -> Result<()>;
    async fn get_session(&self, token_hash: &[u8]) -> Result<Option<Session>>;
    async fn delete_session(&self, token_hash: &[u8]) -> Result<()>;
    /// Delete every session owned by a user. Returns the number removed.
    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64>;
}

/// Create a new raw session token. The value is only handed to the client;
/// stores keep the digest.
///
/// # Errors
/// Returns an error if the system RNG fails.
pub fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Digest a raw token for storage and lookup.
#[must_use]
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// In-memory session store: the single-process default and the test double.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: tokio::sync::Mutex<HashMap<Vec<u8>, Session>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self, session: Session) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session.token_hash.clone(), session);
        Ok(())
    }

    async fn get_session(&self, token_hash: &[u8]) -> Result<Option<Session>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(token_hash).cloned())
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(token_hash);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::Duration;

    fn sample_session(user_id: Uuid, token: &str) -> Session {
        let now = Utc::now();
        Session {
            token_hash: hash_session_token(token),
            user_id,
            created_at: now,
            expires_at: now + Duration::hours(24),
            ip_address: Some("203.0.113.7".to_string()),
            user_agent: Some("integration-test".to_string()),
            is_active: true,
        }
    }

    #[test]
    fn tokens_carry_256_bits() {
        let token = generate_session_token().unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(token.as_bytes()).unwrap();
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn token_hash_is_stable_and_distinct() {
        assert_eq!(hash_session_token("a"), hash_session_token("a"));
        assert_ne!(hash_session_token("a"), hash_session_token("b"));
    }

    #[tokio::test]
    async fn create_lookup_delete_round_trip() {
        let store = InMemorySessionStore::new();
        let user_id = Uuid::new_v4();
        let session = sample_session(user_id, "token-1");

        store.create_session(session.clone()).await.unwrap();
        let found = store
            .get_session(&hash_session_token("token-1"))
            .await
            .unwrap();
        assert_eq!(found, Some(session));

        store
            .delete_session(&hash_session_token("token-1"))
            .await
            .unwrap();
        assert!(store
            .get_session(&hash_session_token("token-1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_user_sessions_removes_only_that_user() {
        let store = InMemorySessionStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.create_session(sample_session(alice, "a1")).await.unwrap();
        store.create_session(sample_session(alice, "a2")).await.unwrap();
        store.create_session(sample_session(bob, "b1")).await.unwrap();

        let removed = store.delete_user_sessions(alice).await.unwrap();
        assert_eq!(removed, 2);
        assert!(store
            .get_session(&hash_session_token("b1"))
            .await
            .unwrap()
            .is_some());
    }
}
