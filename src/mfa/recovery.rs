//! One-time backup codes.
//!
//! Backup codes cover the "phone lost" case: eight codes, hex, rendered in
//! groups of four for readability (`3f9a-77c2`), persisted only as salted
//! Argon2id hashes. A code that verifies is removed from the returned set in
//! the same operation; the caller persists the reduced set so reuse is
//! impossible.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, RngCore};

const BACKUP_CODE_COUNT: usize = 8;
const BACKUP_CODE_LEN: usize = 8;
const BACKUP_CODE_GROUP_SIZE: usize = 4;

/// A freshly generated backup-code batch: plaintext for one-time display,
/// hashes for storage.
#[derive(Debug)]
pub struct BackupCodeSet {
    pub codes: Vec<String>,
    pub code_hashes: Vec<String>,
}

impl BackupCodeSet {
    /// Generate a new batch of backup codes.
    ///
    /// # Errors
    /// Returns an error if code generation or hashing fails.
    pub fn generate() -> Result<Self> {
        let mut rng = OsRng;
        Self::generate_with_rng(&mut rng)
    }

    fn generate_with_rng<R: RngCore + ?Sized>(rng: &mut R) -> Result<Self> {
        let mut codes = Vec::with_capacity(BACKUP_CODE_COUNT);
        let mut code_hashes = Vec::with_capacity(BACKUP_CODE_COUNT);
        for _ in 0..BACKUP_CODE_COUNT {
            let code = generate_code(rng);
            let hash = hash_backup_code(&code)?;
            codes.push(code);
            code_hashes.push(hash);
        }
        Ok(Self { codes, code_hashes })
    }
}

/// Normalize user input for verification: drop separators and whitespace,
/// lowercase the hex.
///
/// # Errors
/// Returns an error if the result is not exactly eight hex characters.
pub fn normalize_backup_code(input: &str) -> Result<String> {
    let normalized: String = input
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_lowercase())
        .collect();

    if normalized.len() != BACKUP_CODE_LEN {
        return Err(anyhow!("invalid backup code length"));
    }
    if !normalized.bytes().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(anyhow!("invalid backup code characters"));
    }
    Ok(normalized)
}

/// Format a normalized code for display (`3f9a-77c2`).
///
/// # Errors
/// Returns an error if the input is not a normalized code.
pub fn format_backup_code(normalized: &str) -> Result<String> {
    if normalized.len() != BACKUP_CODE_LEN {
        return Err(anyhow!("invalid backup code length"));
    }
    let mut out = String::with_capacity(BACKUP_CODE_LEN + 1);
    for (idx, chunk) in normalized.as_bytes().chunks(BACKUP_CODE_GROUP_SIZE).enumerate() {
        if idx > 0 {
            out.push('-');
        }
        out.push_str(std::str::from_utf8(chunk).context("invalid backup code chunk")?);
    }
    Ok(out)
}

/// Verify `input` against a stored set of hashes. On a match, returns the
/// set with the matched entry removed; the caller must persist it. Every
/// hash is checked even after a match so total work does not depend on the
/// match position.
///
/// # Errors
/// Returns an error if a stored hash is malformed.
pub fn verify_and_consume(input: &str, stored_hashes: &[String]) -> Result<Option<Vec<String>>> {
    let Ok(normalized) = normalize_backup_code(input) else {
        return Ok(None);
    };

    let mut matched: Option<usize> = None;
    for (idx, hash) in stored_hashes.iter().enumerate() {
        let parsed =
            PasswordHash::new(hash).map_err(|_| anyhow!("malformed backup code hash"))?;
        let ok = Argon2::default()
            .verify_password(normalized.as_bytes(), &parsed)
            .is_ok();
        if ok && matched.is_none() {
            matched = Some(idx);
        }
    }

    Ok(matched.map(|idx| {
        stored_hashes
            .iter()
            .enumerate()
            .filter(|(candidate, _)| *candidate != idx)
            .map(|(_, hash)| hash.clone())
            .collect()
    }))
}

fn generate_code<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut raw = [0u8; BACKUP_CODE_LEN / 2];
    rng.fill_bytes(&mut raw);
    let mut normalized = String::with_capacity(BACKUP_CODE_LEN);
    for byte in raw {
        normalized.push_str(&format!("{byte:02x}"));
    }
    // The normalized form is always well-formed here.
    format_backup_code(&normalized).unwrap_or(normalized)
}

fn hash_backup_code(code: &str) -> Result<String> {
    let normalized = normalize_backup_code(code)?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(normalized.as_bytes(), &salt)
        .map_err(|_| anyhow!("failed to hash backup code"))?
        .to_string();
    Ok(hash)
}
