//! Error taxonomy for the authentication core.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Every way an authentication operation can fail. Variants carry only what
/// the HTTP layer needs to build a response; anything else stays in logs.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password. One variant for both so responses
    /// never reveal whether an account exists.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account is locked out from failed attempts.
    #[error("account locked until {locked_until}")]
    AccountLocked { locked_until: DateTime<Utc> },

    /// The account exists but has been deactivated.
    #[error("account inactive")]
    AccountInactive,

    /// The MFA code did not verify.
    #[error("invalid MFA code")]
    InvalidMfaCode { attempts_remaining: u32 },

    /// The MFA challenge token is unknown, expired, or exhausted.
    #[error("invalid or expired MFA token")]
    InvalidMfaToken,

    /// The password failed the strength policy.
    #[error("password too weak")]
    PasswordTooWeak { feedback: Vec<String> },

    /// The password appears in a known breach corpus.
    #[error("password found in a known data breach")]
    PasswordBreached,

    /// Registration with a syntactically invalid email.
    #[error("invalid email address")]
    InvalidEmail,

    /// Registration with an email that is already taken.
    #[error("email already registered")]
    EmailTaken,

    /// The email verification token is unknown or expired.
    #[error("invalid or expired verification token")]
    InvalidVerificationToken,

    /// Too many requests for this key.
    #[error("rate limited")]
    RateLimited { retry_after_secs: u64 },

    /// Infrastructure failure (store, RNG, hashing backend).
    #[error(transparent)]
    System(#[from] anyhow::Error),
}
