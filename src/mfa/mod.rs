//! Second-factor verification: TOTP codes and one-time backup codes.
//!
//! Flow Overview:
//! 1) After credentials check out, a user with MFA enabled gets a short-lived
//!    single-use challenge instead of a session.
//! 2) The challenge is answered with a TOTP code or a backup code.
//! 3) A matched backup code is removed from the stored set in the same step,
//!    so it can never be replayed.
//!
//! The challenge attempt budget is enforced by the fixed-window limiter
//! keyed by the challenge id, never by the account email.

pub mod recovery;
pub mod totp;

pub use recovery::BackupCodeSet;
pub use totp::TotpVerifier;
