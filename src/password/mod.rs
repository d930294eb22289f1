//! Password hashing and verification using Argon2id.
//!
//! Hashes are PHC-formatted strings carrying algorithm, version, parameters
//! and salt, so any hash this module ever produced stays verifiable after a
//! parameter change. `needs_rehash` reports when a stored hash predates the
//! current parameters.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;

pub mod breach;
pub mod strength;

pub use breach::{BreachChecker, StaticBreachList};
pub use strength::{PersonalInfo, StrengthPolicy, StrengthReport};

/// Argon2id cost parameters.
///
/// Defaults follow the OWASP recommendation: 19 MiB memory, 2 iterations,
/// single lane. Verification lands in the tens of milliseconds on commodity
/// hardware.
#[derive(Clone, Copy, Debug)]
pub struct HashParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Iteration count.
    pub time_cost: u32,
    /// Parallelism (lanes).
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl HashParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_memory_cost(mut self, kib: u32) -> Self {
        self.memory_cost = kib;
        self
    }

    #[must_use]
    pub const fn with_time_cost(mut self, iterations: u32) -> Self {
        self.time_cost = iterations;
        self
    }

    #[must_use]
    pub const fn with_parallelism(mut self, lanes: u32) -> Self {
        self.parallelism = lanes;
        self
    }

    fn build(&self) -> Result<Params> {
        Params::new(self.memory_cost, self.time_cost, self.parallelism, None)
            .map_err(|err| anyhow!("invalid Argon2 parameters: {err}"))
    }
}

/// Password hasher with a fixed parameter set.
///
/// Also carries a precomputed dummy hash so rejection paths that never touch
/// a real credential (locked account, unknown email) can burn the same
/// verification cost as a wrong-password rejection.
#[derive(Clone)]
pub struct PasswordHasher {
    params: HashParams,
    dummy_hash: String,
}

impl PasswordHasher {
    /// Build a hasher for the given parameters.
    ///
    /// # Errors
    /// Returns an error if the parameters are rejected by the Argon2
    /// implementation.
    pub fn new(params: HashParams) -> Result<Self> {
        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        // Any fixed input works; only the verification cost matters.
        hasher.dummy_hash = hasher.hash("warden-timing-equalizer")?;
        Ok(hasher)
    }

    /// Build a hasher with default parameters.
    ///
    /// # Errors
    /// Returns an error if the default parameters are rejected.
    pub fn with_defaults() -> Result<Self> {
        Self::new(HashParams::default())
    }

    /// Hash a password. A fresh random salt makes every call produce a
    /// different PHC string for the same input.
    ///
    /// # Errors
    /// Hashing failures are system errors; they are never mapped to an
    /// authentication outcome.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.build()?);
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| anyhow!("failed to hash password: {err}"))?;
        Ok(hash.to_string())
    }

    /// Verify a password against a stored PHC hash.
    ///
    /// Returns `Ok(false)` on mismatch; a malformed stored hash is a system
    /// error, not a mismatch.
    ///
    /// # Errors
    /// Returns an error if the stored hash cannot be parsed.
    pub fn verify(&self, password: &str, stored: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(stored).map_err(|err| anyhow!("malformed password hash: {err}"))?;
        // Argon2::default() verifies any Argon2 variant; the digest
        // comparison inside is constant-time.
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Burn a verification's worth of work without consulting any stored
    /// credential. Used to keep locked/unknown rejection timing in line with
    /// wrong-password rejections.
    pub fn burn_verification(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }

    /// Whether a stored hash was produced with different parameters than the
    /// current ones and should be re-hashed on next successful login.
    #[must_use]
    pub fn needs_rehash(&self, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return true;
        };
        if parsed.algorithm != argon2::ARGON2ID_IDENT {
            return true;
        }
        let params = &parsed.params;
        params.get_decimal("m").unwrap_or(0) != self.params.memory_cost
            || params.get_decimal("t").unwrap_or(0) != self.params.time_cost
            || params.get_decimal("p").unwrap_or(0) != self.params.parallelism
    }
}
