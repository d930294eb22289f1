//! User-record store contract.
//!
//! The authentication core never owns user lifecycle: it reads records and
//! requests targeted updates (MFA material, verification flag). Creation
//! happens only through registration, and deletion is an admin concern
//! outside this crate. Two implementations ship: in-memory (single-process
//! default and test double) and Postgres.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PostgresStore;

/// The subset of a user record the security core consumes.
#[derive(Clone, Debug)]
pub struct UserRecord {
    pub id: Uuid,
    /// Unique, stored lowercased.
    pub email: String,
    /// PHC-formatted, algorithm-versioned.
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mfa_enabled: bool,
    /// Base32 TOTP seed; present once enrollment has started.
    pub mfa_secret: Option<String>,
    /// Salted hashes of the remaining backup codes.
    pub backup_code_hashes: Vec<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields registration provides for a new record.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Outcome of attempting to create a user.
#[derive(Debug)]
pub enum CreateUserOutcome {
    Created(UserRecord),
    /// The email is already taken. Reported as a distinct variant so the
    /// caller maps it without string-sniffing database errors.
    Conflict,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;
    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome>;
    /// Persist updated mutable fields (MFA material, flags) for an existing
    /// record.
    async fn update_user(&self, user: &UserRecord) -> Result<()>;
    /// Store a verification-token digest with its expiry.
    async fn insert_verification_token(
        &self,
        user_id: Uuid,
        token_hash: &[u8],
        expires_at: DateTime<Utc>,
    ) -> Result<()>;
    /// Remove and return the token's owner and expiry. Removal and lookup
    /// are one step so a token can never verify twice.
    async fn consume_verification_token(
        &self,
        token_hash: &[u8],
    ) -> Result<Option<(Uuid, DateTime<Utc>)>>;
}
