//! In-memory user store.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CreateUserOutcome, NewUser, UserRecord, UserStore};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserRecord>,
    by_email: HashMap<String, Uuid>,
    verification_tokens: HashMap<Vec<u8>, (Uuid, DateTime<Utc>)>,
}

/// Single-process user store backed by maps. Also the test double for the
/// authentication core.
#[derive(Default)]
pub struct InMemoryUserStore {
    inner: Mutex<Inner>,
}

impl InMemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_email
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome> {
        let mut inner = self.inner.lock().await;
        if inner.by_email.contains_key(&user.email) {
            return Ok(CreateUserOutcome::Conflict);
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email.clone(),
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            mfa_enabled: false,
            mfa_secret: None,
            backup_code_hashes: Vec::new(),
            is_active: true,
            email_verified: false,
            created_at: Utc::now(),
        };
        inner.by_email.insert(user.email, record.id);
        inner.users.insert(record.id, record.clone());
        Ok(CreateUserOutcome::Created(record))
    }

    async fn update_user(&self, user: &UserRecord) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.users.get_mut(&user.id) {
            *existing = user.clone();
        }
        Ok(())
    }

    async fn insert_verification_token(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .verification_tokens
            .insert(token_hash.to_vec(), (user_id, expires_at));
        Ok(())
    }

    async fn consume_verification_token(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<(Uuid, DateTime<Utc>)>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.verification_tokens.remove(token_hash))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn create_then_lookup_by_email_and_id() {
        let store = InMemoryUserStore::new();
        let CreateUserOutcome::Created(record) =
            store.create_user(new_user("alice@example.com")).await.unwrap()
        else {
            panic!("expected creation");
        };

        let by_email = store
            .get_user_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, record.id);
        assert!(store.get_user_by_id(record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = InMemoryUserStore::new();
        store.create_user(new_user("bob@example.com")).await.unwrap();
        let outcome = store.create_user(new_user("bob@example.com")).await.unwrap();
        assert!(matches!(outcome, CreateUserOutcome::Conflict));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_persists_mfa_material() {
        let store = InMemoryUserStore::new();
        let CreateUserOutcome::Created(mut record) =
            store.create_user(new_user("carol@example.com")).await.unwrap()
        else {
            panic!("expected creation");
        };
        record.mfa_enabled = true;
        record.mfa_secret = Some("JBSWY3DPEHPK3PXP".to_string());
        store.update_user(&record).await.unwrap();

        let reloaded = store.get_user_by_id(record.id).await.unwrap().unwrap();
        assert!(reloaded.mfa_enabled);
        assert_eq!(reloaded.mfa_secret.as_deref(), Some("JBSWY3DPEHPK3PXP"));
    }

    #[tokio::test]
    async fn verification_tokens_are_single_use() {
        let store = InMemoryUserStore::new();
        let user_id = Uuid::new_v4();
        let expires = Utc::now() + chrono::Duration::hours(24);
        store
            .insert_verification_token(user_id, b"digest", expires)
            .await
            .unwrap();

        let first = store.consume_verification_token(b"digest").await.unwrap();
        assert_eq!(first.map(|(id, _)| id), Some(user_id));
        let second = store.consume_verification_token(b"digest").await.unwrap();
        assert!(second.is_none());
    }
}
