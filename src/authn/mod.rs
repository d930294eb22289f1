//! Authentication core: orchestration of credentials, lockout, MFA and
//! sessions.
//!
//! Flow Overview:
//! 1) `authenticate` walks lockout check, credential check, MFA check and
//!    session creation in that order. Rejections for locked, unknown and
//!    wrong-password identifiers share one generic error and comparable
//!    timing.
//! 2) An MFA-enrolled account gets a short-lived single-use challenge token
//!    instead of a session; `verify_mfa` answers it with a TOTP or backup
//!    code and only then mints the session.
//! 3) `register` gates on strength and breach status before hashing, and
//!    issues a single-use 24h email verification token.
//!
//! The core holds no HTTP types. Handlers translate `AuthError` variants to
//! status codes and never see stored hashes or MFA secrets.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::mfa::{recovery, BackupCodeSet, TotpVerifier};
use crate::password::{
    BreachChecker, HashParams, PasswordHasher, PersonalInfo, StaticBreachList, StrengthPolicy,
};
use crate::session::{
    generate_session_token, hash_session_token, Session, SessionStore,
};
use crate::store::{CreateUserOutcome, NewUser, UserRecord, UserStore};
use crate::throttle::{FixedWindowLimiter, LockoutConfig, LockoutTracker};

pub mod challenge;
pub mod error;
pub mod utils;

pub use challenge::MfaChallengeStore;
pub use error::AuthError;

use utils::{
    generate_verification_token, hash_verification_token, normalize_email, valid_email,
};

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_REMEMBER_ME_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
const DEFAULT_MFA_CHALLENGE_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_MFA_ATTEMPT_LIMIT: u32 = 5;
const DEFAULT_VERIFICATION_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_ISSUER: &str = "warden";

/// Tunables for the authentication core, builder style.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    session_ttl: Duration,
    remember_me_ttl: Duration,
    mfa_challenge_ttl: Duration,
    mfa_attempt_limit: u32,
    verification_token_ttl: Duration,
    issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl: DEFAULT_SESSION_TTL,
            remember_me_ttl: DEFAULT_REMEMBER_ME_TTL,
            mfa_challenge_ttl: DEFAULT_MFA_CHALLENGE_TTL,
            mfa_attempt_limit: DEFAULT_MFA_ATTEMPT_LIMIT,
            verification_token_ttl: DEFAULT_VERIFICATION_TOKEN_TTL,
            issuer: DEFAULT_ISSUER.to_string(),
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_remember_me_ttl(mut self, ttl: Duration) -> Self {
        self.remember_me_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_mfa_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.mfa_challenge_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn with_mfa_attempt_limit(mut self, limit: u32) -> Self {
        self.mfa_attempt_limit = limit;
        self
    }

    #[must_use]
    pub const fn with_verification_token_ttl(mut self, ttl: Duration) -> Self {
        self.verification_token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    #[must_use]
    pub const fn remember_me_ttl(&self) -> Duration {
        self.remember_me_ttl
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

/// Request metadata recorded on sessions and used for throttle keys.
#[derive(Clone, Debug, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Sanitized user view returned to callers. Never carries the password
/// hash, the MFA secret, or backup-code hashes.
#[derive(Clone, Debug, serde::Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mfa_enabled: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserView {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            mfa_enabled: record.mfa_enabled,
            email_verified: record.email_verified,
            created_at: record.created_at,
        }
    }
}

/// A freshly minted session. The raw token appears here exactly once.
#[derive(Clone, Debug)]
pub struct SessionGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

/// Result of a successful credential check.
#[derive(Clone, Debug)]
pub enum LoginOutcome {
    Authenticated(SessionGrant),
    /// Credentials are good but a second factor is required. No session
    /// exists yet; the challenge token answers exactly one `verify_mfa`.
    MfaRequired { challenge_token: Uuid },
}

/// Result of registration. The verification token is handed to the email
/// collaborator, never returned in an HTTP body.
#[derive(Clone, Debug)]
pub struct Registration {
    pub user: UserView,
    pub verification_token: String,
}

/// TOTP enrollment material shown to the user once.
#[derive(Clone, Debug)]
pub struct TotpEnrollment {
    pub secret: String,
    pub provisioning_uri: String,
}

pub struct Authenticator {
    config: AuthConfig,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    hasher: PasswordHasher,
    strength: StrengthPolicy,
    breach: Arc<dyn BreachChecker>,
    lockout: LockoutTracker,
    limiter: Arc<FixedWindowLimiter>,
    totp: TotpVerifier,
    challenges: MfaChallengeStore,
}

impl Authenticator {
    /// Build a core with default policies over the given stores.
    ///
    /// # Errors
    /// Returns an error if the Argon2 parameters are rejected.
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::with_defaults()?;
        Ok(Self {
            totp: TotpVerifier::new(config.issuer.clone()),
            challenges: MfaChallengeStore::new(config.mfa_challenge_ttl),
            config,
            users,
            sessions,
            hasher,
            strength: StrengthPolicy::default(),
            breach: Arc::new(StaticBreachList::new()),
            lockout: LockoutTracker::with_defaults(),
            limiter: Arc::new(FixedWindowLimiter::new()),
        })
    }

    /// Replace the default Argon2 parameters (tests use cheap ones).
    ///
    /// # Errors
    /// Returns an error if the parameters are rejected.
    pub fn with_hash_params(mut self, params: HashParams) -> anyhow::Result<Self> {
        self.hasher = PasswordHasher::new(params)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_strength_policy(mut self, policy: StrengthPolicy) -> Self {
        self.strength = policy;
        self
    }

    #[must_use]
    pub fn with_breach_checker(mut self, checker: Arc<dyn BreachChecker>) -> Self {
        self.breach = checker;
        self
    }

    #[must_use]
    pub fn with_lockout_config(mut self, config: LockoutConfig) -> Self {
        self.lockout = LockoutTracker::new(config);
        self
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The window limiter, shared with the HTTP rate-limit middleware so
    /// endpoint policies and the MFA attempt budget draw from one table.
    #[must_use]
    pub fn limiter(&self) -> Arc<FixedWindowLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Password login. See the module docs for the state machine.
    ///
    /// # Errors
    /// Authentication failures map to `AuthError` variants; infrastructure
    /// failures surface as `AuthError::System`.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
        client: &ClientInfo,
    ) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);

        let status = self.lockout.check(&email);
        if status.is_locked {
            // Burn a hash verification so the locked path is not trivially
            // faster than a wrong-password rejection.
            self.hasher.burn_verification(password);
            warn!(ip = ?client.ip_address, "login attempt against locked identifier");
            return Err(AuthError::AccountLocked {
                locked_until: instant_to_utc(status.locked_until),
            });
        }

        let Some(user) = self.users.get_user_by_email(&email).await? else {
            self.hasher.burn_verification(password);
            self.lockout.record_failure(&email);
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            let status = self.lockout.record_failure(&email);
            info!(
                remaining = status.remaining_attempts,
                "password mismatch recorded"
            );
            if status.is_locked {
                return Err(AuthError::AccountLocked {
                    locked_until: instant_to_utc(status.locked_until),
                });
            }
            return Err(AuthError::InvalidCredentials);
        }

        // Inactive is only reported once the password has checked out, so
        // probing with wrong passwords cannot distinguish deactivated
        // accounts from unknown ones.
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        self.maybe_rehash(&user, password).await;

        // The failure counter only resets on full authentication. An
        // MFA-pending login keeps it; `verify_mfa` clears it on success.
        if user.mfa_enabled {
            let challenge_token = self.challenges.issue(user.id, remember_me).await;
            return Ok(LoginOutcome::MfaRequired { challenge_token });
        }

        self.lockout.record_success(&email);
        let grant = self.mint_session(&user, remember_me, client).await?;
        Ok(LoginOutcome::Authenticated(grant))
    }

    /// Answer an MFA challenge with a TOTP or backup code.
    ///
    /// The challenge token is single-use: success consumes it, and so does
    /// exhausting the attempt budget. A wrong code with budget left keeps
    /// the challenge alive.
    ///
    /// # Errors
    /// `InvalidMfaToken` for unknown/expired/exhausted challenges,
    /// `InvalidMfaCode` for a wrong code with budget remaining.
    pub async fn verify_mfa(
        &self,
        challenge_token: &str,
        code: &str,
        client: &ClientInfo,
    ) -> Result<SessionGrant, AuthError> {
        let challenge_id =
            Uuid::parse_str(challenge_token).map_err(|_| AuthError::InvalidMfaToken)?;

        // Attempt budget keyed by the challenge id, not the email, so a
        // stream of bad codes burns this challenge without locking the
        // account out of a fresh password login.
        let decision = self.limiter.increment(
            &format!("mfa:{challenge_id}"),
            self.config.mfa_challenge_ttl,
            self.config.mfa_attempt_limit,
        );
        if !decision.allowed {
            self.challenges.take(challenge_id).await;
            warn!("MFA attempt budget exhausted, challenge revoked");
            return Err(AuthError::InvalidMfaToken);
        }

        let Some(challenge) = self.challenges.peek(challenge_id).await else {
            return Err(AuthError::InvalidMfaToken);
        };

        let Some(user) = self.users.get_user_by_id(challenge.user_id).await? else {
            self.challenges.take(challenge_id).await;
            return Err(AuthError::InvalidMfaToken);
        };

        if !self.check_second_factor(&user, code).await? {
            return Err(AuthError::InvalidMfaCode {
                attempts_remaining: decision.remaining,
            });
        }

        // Consume the challenge. A concurrent verify racing us loses here.
        if self.challenges.take(challenge_id).await.is_none() {
            return Err(AuthError::InvalidMfaToken);
        }

        self.lockout.record_success(&user.email);
        self.mint_session(&user, challenge.remember_me, client).await
    }

    /// Register a new account: strength gate, breach gate, hash, create,
    /// then issue the email verification token.
    ///
    /// # Errors
    /// `PasswordTooWeak`, `PasswordBreached`, `EmailTaken`, or `System`.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<Registration, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }

        let personal = PersonalInfo {
            email: Some(email.clone()),
            first_name: first_name.clone(),
            last_name: last_name.clone(),
        };
        let report = self.strength.evaluate(password, Some(&personal));
        if !report.is_valid {
            return Err(AuthError::PasswordTooWeak {
                feedback: report.feedback,
            });
        }

        if self.breach.is_breached(password).await? {
            return Err(AuthError::PasswordBreached);
        }

        let password_hash = self.hasher.hash(password)?;
        let outcome = self
            .users
            .create_user(NewUser {
                email: email.clone(),
                password_hash,
                first_name,
                last_name,
            })
            .await?;
        let user = match outcome {
            CreateUserOutcome::Created(user) => user,
            CreateUserOutcome::Conflict => return Err(AuthError::EmailTaken),
        };

        let token = generate_verification_token().map_err(AuthError::System)?;
        let expires_at = Utc::now() + to_chrono(self.config.verification_token_ttl);
        self.users
            .insert_verification_token(user.id, &hash_verification_token(&token), expires_at)
            .await?;

        info!(user_id = %user.id, "user registered");
        Ok(Registration {
            user: UserView::from(&user),
            verification_token: token,
        })
    }

    /// Consume an email verification token and mark the account verified.
    ///
    /// # Errors
    /// `InvalidVerificationToken` for unknown or expired tokens.
    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        let Some((user_id, expires_at)) = self
            .users
            .consume_verification_token(&hash_verification_token(token))
            .await?
        else {
            return Err(AuthError::InvalidVerificationToken);
        };
        // Consumption already removed the token; an expired one is simply
        // rejected after removal.
        if Utc::now() >= expires_at {
            return Err(AuthError::InvalidVerificationToken);
        }

        let Some(mut user) = self.users.get_user_by_id(user_id).await? else {
            return Err(AuthError::InvalidVerificationToken);
        };
        user.email_verified = true;
        self.users.update_user(&user).await?;
        info!(user_id = %user.id, "email verified");
        Ok(())
    }

    /// Look up the session for a raw token. Expired or orphaned sessions are
    /// deleted on the way out.
    ///
    /// # Errors
    /// Only infrastructure failures; an absent session is `Ok(None)`.
    pub async fn session(
        &self,
        raw_token: &str,
    ) -> Result<Option<(Session, UserView)>, AuthError> {
        let token_hash = hash_session_token(raw_token);
        let Some(session) = self.sessions.get_session(&token_hash).await? else {
            return Ok(None);
        };

        if !session.is_active || session.is_expired(Utc::now()) {
            self.sessions.delete_session(&token_hash).await?;
            return Ok(None);
        }

        let Some(user) = self.users.get_user_by_id(session.user_id).await? else {
            self.sessions.delete_session(&token_hash).await?;
            return Ok(None);
        };
        if !user.is_active {
            self.sessions.delete_session(&token_hash).await?;
            return Ok(None);
        }

        Ok(Some((session, UserView::from(&user))))
    }

    /// Delete the session for a raw token. Idempotent.
    ///
    /// # Errors
    /// Only infrastructure failures.
    pub async fn logout(&self, raw_token: &str) -> Result<(), AuthError> {
        self.sessions
            .delete_session(&hash_session_token(raw_token))
            .await?;
        Ok(())
    }

    /// Delete every session a user owns. Returns the number removed.
    ///
    /// # Errors
    /// Only infrastructure failures.
    pub async fn logout_all(&self, user_id: Uuid) -> Result<u64, AuthError> {
        Ok(self.sessions.delete_user_sessions(user_id).await?)
    }

    /// Start TOTP enrollment: store a fresh secret (MFA stays off until
    /// confirmed) and return the provisioning material.
    ///
    /// # Errors
    /// `InvalidCredentials` if the user is gone, `AccountInactive` if
    /// deactivated.
    pub async fn begin_totp_enrollment(
        &self,
        user_id: Uuid,
    ) -> Result<TotpEnrollment, AuthError> {
        let Some(mut user) = self.users.get_user_by_id(user_id).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !user.is_active {
            return Err(AuthError::AccountInactive);
        }

        let secret = TotpVerifier::generate_secret();
        let provisioning_uri = self
            .totp
            .provisioning_uri(&secret, &user.email)
            .map_err(AuthError::System)?;
        user.mfa_secret = Some(secret.clone());
        self.users.update_user(&user).await?;

        Ok(TotpEnrollment {
            secret,
            provisioning_uri,
        })
    }

    /// Finish TOTP enrollment: the user proves possession of the secret with
    /// one valid code, MFA turns on, and a fresh backup-code batch is
    /// returned (plaintext, shown exactly once).
    ///
    /// # Errors
    /// `InvalidMfaCode` if the code does not verify, `InvalidMfaToken` if no
    /// enrollment is pending.
    pub async fn confirm_totp_enrollment(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Vec<String>, AuthError> {
        let Some(mut user) = self.users.get_user_by_id(user_id).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        let Some(secret) = user.mfa_secret.clone() else {
            return Err(AuthError::InvalidMfaToken);
        };

        if !self.totp.verify(code, &secret).map_err(AuthError::System)? {
            return Err(AuthError::InvalidMfaCode {
                attempts_remaining: 0,
            });
        }

        let batch = BackupCodeSet::generate().map_err(AuthError::System)?;
        user.mfa_enabled = true;
        user.backup_code_hashes = batch.code_hashes;
        self.users.update_user(&user).await?;
        info!(user_id = %user.id, "TOTP enrollment confirmed");

        Ok(batch.codes)
    }

    /// Prune expired lockout entries, rate-limit windows and MFA
    /// challenges. Called by the periodic sweeper.
    pub async fn sweep_expired(&self) {
        self.lockout.sweep();
        self.limiter.sweep();
        self.challenges.sweep().await;
    }

    async fn check_second_factor(
        &self,
        user: &UserRecord,
        code: &str,
    ) -> Result<bool, AuthError> {
        if let Some(secret) = &user.mfa_secret {
            if self.totp.verify(code, secret).map_err(AuthError::System)? {
                return Ok(true);
            }
        }

        if let Some(remaining) = recovery::verify_and_consume(code, &user.backup_code_hashes)? {
            let mut updated = user.clone();
            updated.backup_code_hashes = remaining;
            self.users.update_user(&updated).await?;
            info!(user_id = %user.id, "backup code consumed");
            return Ok(true);
        }

        Ok(false)
    }

    async fn mint_session(
        &self,
        user: &UserRecord,
        remember_me: bool,
        client: &ClientInfo,
    ) -> Result<SessionGrant, AuthError> {
        let token = generate_session_token().map_err(AuthError::System)?;
        let ttl = if remember_me {
            self.config.remember_me_ttl
        } else {
            self.config.session_ttl
        };
        let now = Utc::now();
        let expires_at = now + to_chrono(ttl);

        self.sessions
            .create_session(Session {
                token_hash: hash_session_token(&token),
                user_id: user.id,
                created_at: now,
                expires_at,
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
                is_active: true,
            })
            .await?;

        Ok(SessionGrant {
            token,
            expires_at,
            user: UserView::from(user),
        })
    }

    /// Opportunistic upgrade of hashes produced under older parameters. A
    /// failure here never fails the login.
    async fn maybe_rehash(&self, user: &UserRecord, password: &str) {
        if !self.hasher.needs_rehash(&user.password_hash) {
            return;
        }
        match self.hasher.hash(password) {
            Ok(hash) => {
                let mut updated = user.clone();
                updated.password_hash = hash;
                if let Err(err) = self.users.update_user(&updated).await {
                    warn!(user_id = %user.id, error = %err, "rehash persist failed");
                }
            }
            Err(err) => warn!(user_id = %user.id, error = %err, "rehash failed"),
        }
    }
}

fn instant_to_utc(at: Option<Instant>) -> DateTime<Utc> {
    let remaining = at
        .map(|until| until.saturating_duration_since(Instant::now()))
        .unwrap_or_default();
    Utc::now() + to_chrono(remaining)
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::zero())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;
    use crate::store::InMemoryUserStore;

    const STRONG_PASSWORD: &str = "Tr4verse!Mountain";

    fn core() -> Authenticator {
        let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        Authenticator::new(AuthConfig::default(), users, sessions)
            .unwrap()
            .with_hash_params(HashParams::new().with_memory_cost(1024).with_time_cost(1))
            .unwrap()
    }

    async fn register(core: &Authenticator, email: &str) -> Registration {
        core.register(email, STRONG_PASSWORD, Some("Alice".into()), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_then_authenticate() {
        let core = core();
        let registration = register(&core, "alice@example.com").await;
        assert_eq!(registration.user.email, "alice@example.com");
        assert!(!registration.user.email_verified);

        let outcome = core
            .authenticate("Alice@Example.com", STRONG_PASSWORD, false, &ClientInfo::default())
            .await
            .unwrap();
        let LoginOutcome::Authenticated(grant) = outcome else {
            panic!("expected a session");
        };
        let delta = grant.expires_at - Utc::now();
        assert!((delta.num_minutes() - 24 * 60).abs() <= 1);
    }

    #[tokio::test]
    async fn remember_me_extends_the_session() {
        let core = core();
        register(&core, "alice@example.com").await;
        let outcome = core
            .authenticate("alice@example.com", STRONG_PASSWORD, true, &ClientInfo::default())
            .await
            .unwrap();
        let LoginOutcome::Authenticated(grant) = outcome else {
            panic!("expected a session");
        };
        assert!((grant.expires_at - Utc::now()).num_days() >= 29);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let core = core();
        register(&core, "alice@example.com").await;

        let wrong = core
            .authenticate("alice@example.com", "Wrong!Password9", false, &ClientInfo::default())
            .await;
        let unknown = core
            .authenticate("ghost@example.com", "Wrong!Password9", false, &ClientInfo::default())
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn five_failures_lock_even_the_correct_password() {
        let core = core();
        register(&core, "alice@example.com").await;

        for _ in 0..5 {
            let _ = core
                .authenticate("alice@example.com", "Wrong!Password9", false, &ClientInfo::default())
                .await;
        }
        let result = core
            .authenticate("alice@example.com", STRONG_PASSWORD, false, &ClientInfo::default())
            .await;
        let Err(AuthError::AccountLocked { locked_until }) = result else {
            panic!("expected lockout, got {result:?}");
        };
        let minutes = (locked_until - Utc::now()).num_minutes();
        assert!((28..=30).contains(&minutes), "lockout ~30m out, got {minutes}");
    }

    #[tokio::test]
    async fn weak_and_breached_passwords_are_rejected() {
        let core = core();
        let weak = core.register("bob@example.com", "short", None, None).await;
        assert!(matches!(weak, Err(AuthError::PasswordTooWeak { .. })));

        // On the static breach list but passes the strength gate.
        let breached = core
            .with_breach_checker(Arc::new(crate::password::StaticBreachList::with_entries([
                "Tr4verse!Mountain",
            ])))
            .register("bob@example.com", STRONG_PASSWORD, None, None)
            .await;
        assert!(matches!(breached, Err(AuthError::PasswordBreached)));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let core = core();
        register(&core, "alice@example.com").await;
        let second = core
            .register("alice@example.com", STRONG_PASSWORD, None, None)
            .await;
        assert!(matches!(second, Err(AuthError::EmailTaken)));
    }

    #[tokio::test]
    async fn verification_token_is_single_use() {
        let core = core();
        let registration = register(&core, "alice@example.com").await;

        core.verify_email(&registration.verification_token).await.unwrap();
        let replay = core.verify_email(&registration.verification_token).await;
        assert!(matches!(replay, Err(AuthError::InvalidVerificationToken)));
    }

    #[tokio::test]
    async fn verification_token_expires() {
        let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let core = Authenticator::new(
            AuthConfig::new().with_verification_token_ttl(Duration::ZERO),
            users,
            sessions,
        )
        .unwrap()
        .with_hash_params(HashParams::new().with_memory_cost(1024).with_time_cost(1))
        .unwrap();

        let registration = register(&core, "alice@example.com").await;
        let expired = core.verify_email(&registration.verification_token).await;
        assert!(matches!(expired, Err(AuthError::InvalidVerificationToken)));
    }

    #[tokio::test]
    async fn session_lookup_logout_round_trip() {
        let core = core();
        register(&core, "alice@example.com").await;
        let LoginOutcome::Authenticated(grant) = core
            .authenticate("alice@example.com", STRONG_PASSWORD, false, &ClientInfo::default())
            .await
            .unwrap()
        else {
            panic!("expected a session");
        };

        let found = core.session(&grant.token).await.unwrap();
        assert_eq!(found.map(|(_, user)| user.email), Some("alice@example.com".into()));

        core.logout(&grant.token).await.unwrap();
        assert!(core.session(&grant.token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mfa_enrollment_then_login_needs_second_factor() {
        let core = core();
        let registration = register(&core, "alice@example.com").await;

        let enrollment = core.begin_totp_enrollment(registration.user.id).await.unwrap();
        assert!(enrollment.provisioning_uri.starts_with("otpauth://totp/"));

        // Enrollment is confirmed with a live code.
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let totp = TotpVerifier::new("warden");
        let code = totp.generate_at(&enrollment.secret, now).unwrap();
        let backup_codes = core
            .confirm_totp_enrollment(registration.user.id, &code)
            .await
            .unwrap();
        assert_eq!(backup_codes.len(), 8);

        let outcome = core
            .authenticate("alice@example.com", STRONG_PASSWORD, false, &ClientInfo::default())
            .await
            .unwrap();
        let LoginOutcome::MfaRequired { challenge_token } = outcome else {
            panic!("expected an MFA challenge");
        };

        // A backup code answers the challenge and mints the session.
        let grant = core
            .verify_mfa(
                &challenge_token.to_string(),
                &backup_codes[0],
                &ClientInfo::default(),
            )
            .await
            .unwrap();
        assert!(core.session(&grant.token).await.unwrap().is_some());

        // The challenge was consumed.
        let replay = core
            .verify_mfa(
                &challenge_token.to_string(),
                &backup_codes[1],
                &ClientInfo::default(),
            )
            .await;
        assert!(matches!(replay, Err(AuthError::InvalidMfaToken)));
    }

    #[tokio::test]
    async fn mfa_budget_exhaustion_revokes_the_challenge() {
        let core = core();
        let registration = register(&core, "alice@example.com").await;
        let enrollment = core.begin_totp_enrollment(registration.user.id).await.unwrap();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let code = TotpVerifier::new("warden")
            .generate_at(&enrollment.secret, now)
            .unwrap();
        core.confirm_totp_enrollment(registration.user.id, &code)
            .await
            .unwrap();

        let LoginOutcome::MfaRequired { challenge_token } = core
            .authenticate("alice@example.com", STRONG_PASSWORD, false, &ClientInfo::default())
            .await
            .unwrap()
        else {
            panic!("expected an MFA challenge");
        };
        let token = challenge_token.to_string();

        for _ in 0..5 {
            let result = core.verify_mfa(&token, "000000", &ClientInfo::default()).await;
            assert!(matches!(result, Err(AuthError::InvalidMfaCode { .. })));
        }
        // Budget spent: even a later attempt reports a dead token.
        let result = core.verify_mfa(&token, "000000", &ClientInfo::default()).await;
        assert!(matches!(result, Err(AuthError::InvalidMfaToken)));
    }

    #[tokio::test]
    async fn mfa_pending_login_keeps_the_failure_counter() {
        let core = core();
        let registration = register(&core, "alice@example.com").await;
        let enrollment = core.begin_totp_enrollment(registration.user.id).await.unwrap();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let code = TotpVerifier::new("warden")
            .generate_at(&enrollment.secret, now)
            .unwrap();
        core.confirm_totp_enrollment(registration.user.id, &code)
            .await
            .unwrap();

        for _ in 0..4 {
            let _ = core
                .authenticate("alice@example.com", "Wrong!Password9", false, &ClientInfo::default())
                .await;
        }

        // Correct password, but only the first factor: still MFA-pending.
        let pending = core
            .authenticate("alice@example.com", STRONG_PASSWORD, false, &ClientInfo::default())
            .await
            .unwrap();
        assert!(matches!(pending, LoginOutcome::MfaRequired { .. }));

        // Had the pending login reset the counter, this fifth failure
        // would be a plain rejection instead of the lock.
        let fifth = core
            .authenticate("alice@example.com", "Wrong!Password9", false, &ClientInfo::default())
            .await;
        assert!(matches!(fifth, Err(AuthError::AccountLocked { .. })));
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_at_registration() {
        let core = core();
        let result = core.register("not-an-email", STRONG_PASSWORD, None, None).await;
        assert!(matches!(result, Err(AuthError::InvalidEmail)));
    }
}
