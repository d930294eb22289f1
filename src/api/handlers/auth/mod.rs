//! Auth endpoint handlers.
//!
//! Flow Overview:
//! 1) `signin` charges the per-(ip, email) auth budget, runs the core state
//!    machine, and either sets a session cookie or returns an MFA challenge.
//! 2) `mfa_verify` answers a challenge and sets the cookie on success.
//! 3) `signup` registers with strength and breach gating; `verify_email`
//!    consumes the emailed token.
//! 4) `session` / `signout` resolve the cookie (or bearer token); MFA
//!    enrollment endpoints require a live session.
//!
//! Handlers log infrastructure failures and answer with generic bodies;
//! `AuthError` variants map to status codes here and nowhere else.

use axum::{
    http::{
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::authn::{AuthError, ClientInfo};

pub mod mfa;
pub mod session;
pub mod signin;
pub mod signup;
pub mod types;

pub use mfa::{mfa_enroll, mfa_enroll_confirm, mfa_verify};
pub use session::{session, signout};
pub use signin::signin;
pub use signup::{signup, verify_email};

pub(crate) const SESSION_COOKIE_NAME: &str = "warden_session";

/// Cookie attributes decided at server startup.
#[derive(Clone, Copy, Debug)]
pub struct CookieSettings {
    secure: bool,
}

impl CookieSettings {
    #[must_use]
    pub const fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// Build the `HttpOnly` session cookie.
    pub(super) fn session_cookie(&self, token: &str, max_age_secs: i64) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie).ok()
    }

    pub(super) fn clear_session_cookie(&self) -> Option<HeaderValue> {
        self.session_cookie("", 0)
    }
}

/// Map a core error to its HTTP response. System errors are logged here and
/// surface as a generic 500.
pub(super) fn error_response(err: AuthError) -> Response {
    match err {
        AuthError::InvalidCredentials => {
            status_body(StatusCode::UNAUTHORIZED, "Invalid email or password")
        }
        AuthError::AccountLocked { locked_until } => (
            StatusCode::LOCKED,
            Json(json!({
                "error": "Account temporarily locked",
                "lockedUntil": locked_until,
            })),
        )
            .into_response(),
        AuthError::AccountInactive => status_body(StatusCode::FORBIDDEN, "Account is deactivated"),
        AuthError::InvalidMfaCode { attempts_remaining } => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid MFA code",
                "attemptsRemaining": attempts_remaining,
            })),
        )
            .into_response(),
        AuthError::InvalidMfaToken => {
            status_body(StatusCode::UNAUTHORIZED, "Invalid or expired MFA token")
        }
        AuthError::PasswordTooWeak { feedback } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "Password does not meet the strength policy",
                "feedback": feedback,
            })),
        )
            .into_response(),
        AuthError::PasswordBreached => status_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Password found in a known data breach",
        ),
        AuthError::InvalidEmail => {
            status_body(StatusCode::UNPROCESSABLE_ENTITY, "Invalid email address")
        }
        AuthError::EmailTaken => status_body(StatusCode::CONFLICT, "Email already registered"),
        AuthError::InvalidVerificationToken => status_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid or expired verification token",
        ),
        AuthError::RateLimited { retry_after_secs } => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Too many requests",
                    "retryAfter": retry_after_secs,
                })),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("retry-after", value);
            }
            response
        }
        AuthError::System(err) => {
            error!("auth operation failed: {err:#}");
            status_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

fn status_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Request metadata for session records and throttle keys.
pub(super) fn client_info(headers: &HeaderMap) -> ClientInfo {
    ClientInfo {
        ip_address: crate::api::rate_limit::extract_client_ip(headers),
        user_agent: headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    }
}

/// Pull the session token from a bearer header or the session cookie.
pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Attach the session cookie to a response.
pub(super) fn with_session_cookie(
    mut response: Response,
    settings: CookieSettings,
    token: &str,
    max_age_secs: i64,
) -> Response {
    if let Some(cookie) = settings.session_cookie(token, max_age_secs) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}
