//! TOTP generation and verification (RFC 6238).
//!
//! Standard parameters: SHA-1, 6 digits, 30-second step, and a skew of two
//! steps either side (±60s) to absorb client clock drift.

use anyhow::{anyhow, Result};
use totp_rs::{Algorithm, Secret, TOTP};

const DIGITS: usize = 6;
const STEP_SECONDS: u64 = 30;
const SKEW_STEPS: u8 = 2;

/// Stateless TOTP helper bound to an issuer name for provisioning URIs.
#[derive(Clone, Debug)]
pub struct TotpVerifier {
    issuer: String,
}

impl TotpVerifier {
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Generate a fresh base32 shared secret (160 bits).
    #[must_use]
    pub fn generate_secret() -> String {
        match Secret::generate_secret().to_encoded() {
            Secret::Encoded(encoded) => encoded,
            // to_encoded always yields the encoded variant.
            Secret::Raw(_) => String::new(),
        }
    }

    /// Verify a code against the current wall-clock time.
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32 or the system
    /// clock is unavailable.
    pub fn verify(&self, code: &str, secret_base32: &str) -> Result<bool> {
        let totp = self.build(secret_base32, "user")?;
        totp.check_current(code)
            .map_err(|err| anyhow!("system time unavailable: {err}"))
    }

    /// Verify a code at an explicit unix timestamp. Exists so the skew
    /// window is testable without sleeping.
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32.
    pub fn verify_at(&self, code: &str, secret_base32: &str, unix_time: u64) -> Result<bool> {
        let totp = self.build(secret_base32, "user")?;
        Ok(totp.check(code, unix_time))
    }

    /// Generate the code for an explicit unix timestamp (enrollment
    /// confirmation and tests).
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32.
    pub fn generate_at(&self, secret_base32: &str, unix_time: u64) -> Result<String> {
        let totp = self.build(secret_base32, "user")?;
        Ok(totp.generate(unix_time))
    }

    /// Build the `otpauth://` provisioning URI shown to the user at
    /// enrollment.
    ///
    /// # Errors
    /// Returns an error if the secret is not valid base32.
    pub fn provisioning_uri(&self, secret_base32: &str, account: &str) -> Result<String> {
        let totp = self.build(secret_base32, account)?;
        Ok(totp.get_url())
    }

    fn build(&self, secret_base32: &str, account: &str) -> Result<TOTP> {
        let secret = Secret::Encoded(secret_base32.to_string())
            .to_bytes()
            .map_err(|err| anyhow!("invalid TOTP secret: {err:?}"))?;
        TOTP::new(
            Algorithm::SHA1,
            DIGITS,
            SKEW_STEPS,
            STEP_SECONDS,
            secret,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|err| anyhow!("failed to build TOTP: {err}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn verifier() -> TotpVerifier {
        TotpVerifier::new("warden")
    }

    #[test]
    fn generated_secret_is_valid_base32() {
        let secret = TotpVerifier::generate_secret();
        let code = verifier().generate_at(&secret, NOW).unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|ch| ch.is_ascii_digit()));
    }

    #[test]
    fn accepts_codes_within_the_skew_window() {
        let secret = TotpVerifier::generate_secret();
        let verifier = verifier();

        for offset in [0i64, -30, 30, -60, 60] {
            let at = NOW.checked_add_signed(offset).unwrap();
            let code = verifier.generate_at(&secret, at).unwrap();
            assert!(
                verifier.verify_at(&code, &secret, NOW).unwrap(),
                "code from offset {offset}s should verify"
            );
        }
    }

    #[test]
    fn rejects_codes_outside_the_skew_window() {
        let secret = TotpVerifier::generate_secret();
        let verifier = verifier();

        let stale = verifier.generate_at(&secret, NOW - 120).unwrap();
        let future = verifier.generate_at(&secret, NOW + 120).unwrap();
        // A code four steps away can still collide by chance, but with six
        // digits the chance is one in a million; these timestamps were
        // picked to not collide.
        assert!(!verifier.verify_at(&stale, &secret, NOW).unwrap());
        assert!(!verifier.verify_at(&future, &secret, NOW).unwrap());
    }

    #[test]
    fn rejects_wrong_code() {
        let secret = TotpVerifier::generate_secret();
        let verifier = verifier();
        let code = verifier.generate_at(&secret, NOW).unwrap();
        let wrong = if code == "000000" { "111111" } else { "000000" };
        assert!(!verifier.verify_at(wrong, &secret, NOW).unwrap());
    }

    #[test]
    fn provisioning_uri_carries_issuer_and_account() {
        let secret = TotpVerifier::generate_secret();
        let uri = verifier()
            .provisioning_uri(&secret, "alice@example.com")
            .unwrap();
        assert!(uri.starts_with("otpauth://totp/"));
        assert!(uri.contains("issuer=warden"));
        assert!(uri.contains("alice%40example.com"));
    }

    #[test]
    fn invalid_secret_is_an_error() {
        assert!(verifier().verify_at("123456", "not base32!!", NOW).is_err());
    }
}
