//! Breached-password checks.
//!
//! Two implementations share one trait: a built-in static list for
//! offline/single-process deployments, and a k-anonymity range client for
//! the Have I Been Pwned API. The remote variant only ever transmits the
//! first five characters of the SHA-1 digest, so the plaintext (and even the
//! full digest) never leaves the process.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha1::{Digest, Sha1};
use std::collections::HashSet;

/// Decides whether a password is known to be breached.
#[async_trait]
pub trait BreachChecker: Send + Sync {
    async fn is_breached(&self, password: &str) -> Result<bool>;
}

/// Static in-process breach list. The default set covers the passwords every
/// credential-stuffing list opens with; deployments can extend it.
#[derive(Clone, Debug, Default)]
pub struct StaticBreachList {
    entries: HashSet<String>,
}

impl StaticBreachList {
    #[must_use]
    pub fn new() -> Self {
        let entries = [
            "password",
            "password1",
            "password123",
            "123456",
            "12345678",
            "123456789",
            "qwerty",
            "abc123",
            "letmein",
            "welcome",
            "admin123",
            "passw0rd",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        Self { entries }
    }

    #[must_use]
    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|entry| entry.into().to_lowercase()).collect(),
        }
    }
}

#[async_trait]
impl BreachChecker for StaticBreachList {
    async fn is_breached(&self, password: &str) -> Result<bool> {
        Ok(self.entries.contains(&password.to_lowercase()))
    }
}

/// Have I Been Pwned range client (k-anonymity model).
#[derive(Clone, Debug)]
pub struct HibpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HibpClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://api.pwnedpasswords.com".to_string())
    }

    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build HIBP client")?;
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl BreachChecker for HibpClient {
    async fn is_breached(&self, password: &str) -> Result<bool> {
        let digest = sha1_hex_upper(password);
        let (prefix, suffix) = digest.split_at(5);

        let url = format!("{}/range/{prefix}", self.base_url.trim_end_matches('/'));
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .context("HIBP range request failed")?
            .error_for_status()
            .context("HIBP range request rejected")?
            .text()
            .await
            .context("failed to read HIBP range response")?;

        Ok(range_contains(&body, suffix))
    }
}

fn sha1_hex_upper(password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

/// Each response line is `SUFFIX:COUNT`.
fn range_contains(body: &str, suffix: &str) -> bool {
    body.lines().any(|line| {
        line.split(':')
            .next()
            .is_some_and(|candidate| candidate.trim().eq_ignore_ascii_case(suffix))
    })
}
