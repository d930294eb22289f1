//! Account security core for a multi-tenant authentication service.
//!
//! The crate is organized around a small set of collaborators:
//!
//! - [`password`]: Argon2id hashing, strength scoring, breach checks.
//! - [`throttle`]: fixed-window rate limiting and account lockout.
//! - [`mfa`]: TOTP and one-time backup codes.
//! - [`session`]: session tokens and the session store contract.
//! - [`store`]: user records and the user store contract.
//! - [`authn`]: the orchestration core tying the above together.
//! - [`api`]: the axum HTTP surface.
//! - [`cli`]: clap command line and server startup.

pub mod api;
pub mod authn;
pub mod cli;
pub mod mfa;
pub mod password;
pub mod session;
pub mod store;
pub mod throttle;

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
