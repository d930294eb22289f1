//! Per-route rate limiting over the shared fixed-window limiter.
//!
//! Every response gets `X-RateLimit-Limit`, `X-RateLimit-Remaining` and
//! `X-RateLimit-Reset`; a denied request gets 429 with `Retry-After` and a
//! JSON body carrying `retryAfter` in seconds. Auth endpoints additionally
//! charge an `(ip, email)` pair inside their handlers, since the middleware
//! never reads request bodies.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::throttle::{FixedWindowLimiter, WindowDecision};

/// A named rate-limit policy: window length, ceiling, and key prefix.
#[derive(Clone, Copy, Debug)]
pub struct RatePolicy {
    pub name: &'static str,
    pub window: Duration,
    pub max_requests: u32,
}

impl RatePolicy {
    /// Auth attempts: 10 per 15 minutes, charged per `(ip, email)` pair
    /// inside the signin/signup handlers.
    #[must_use]
    pub const fn auth() -> Self {
        Self {
            name: "auth",
            window: Duration::from_secs(15 * 60),
            max_requests: 10,
        }
    }

    /// Per-IP flood guard in front of the auth endpoints. Sits well above
    /// the pair budget so a single IP can still serve many accounts; the
    /// pair budget stays the binding constraint per account.
    #[must_use]
    pub const fn auth_per_ip() -> Self {
        Self {
            name: "auth-ip",
            window: Duration::from_secs(15 * 60),
            max_requests: 100,
        }
    }

    /// Generic API: 100 requests per minute per IP.
    #[must_use]
    pub const fn api() -> Self {
        Self {
            name: "api",
            window: Duration::from_secs(60),
            max_requests: 100,
        }
    }

    /// Sensitive one-off operations: 3 per hour per IP.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            name: "strict",
            window: Duration::from_secs(60 * 60),
            max_requests: 3,
        }
    }

    /// Health/monitoring probes: 30 per minute per IP.
    #[must_use]
    pub const fn monitoring() -> Self {
        Self {
            name: "monitoring",
            window: Duration::from_secs(60),
            max_requests: 30,
        }
    }
}

#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<FixedWindowLimiter>,
    policy: RatePolicy,
}

impl RateLimitState {
    #[must_use]
    pub fn new(limiter: Arc<FixedWindowLimiter>, policy: RatePolicy) -> Self {
        Self { limiter, policy }
    }
}

/// Middleware enforcing the policy keyed by client IP.
pub async fn enforce(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = extract_client_ip(request.headers()).unwrap_or_else(|| "unknown".to_string());
    let key = format!("{}:{ip}", state.policy.name);
    let decision = state
        .limiter
        .increment(&key, state.policy.window, state.policy.max_requests);

    if !decision.allowed {
        let mut response = too_many_requests(&decision);
        stamp_headers(&mut response, state.policy.max_requests, &decision);
        return response;
    }

    let mut response = next.run(request).await;
    // A handler that charged a tighter budget already stamped the headers.
    if !response.headers().contains_key("x-ratelimit-limit") {
        stamp_headers(&mut response, state.policy.max_requests, &decision);
    }
    response
}

/// Build the 429 response for an exhausted window.
#[must_use]
pub fn too_many_requests(decision: &WindowDecision) -> Response {
    let retry_after = decision.retry_after_secs();
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "Too many requests",
            "retryAfter": retry_after,
        })),
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert("retry-after", value);
    }
    response
}

/// Stamp the standard rate-limit headers onto any response.
pub fn stamp_headers(response: &mut Response, limit: u32, decision: &WindowDecision) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&limit.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
    if let Ok(value) = HeaderValue::from_str(&reset_epoch(decision).to_string()) {
        headers.insert("x-ratelimit-reset", value);
    }
}

/// Extract a client IP for rate limiting from common proxy headers.
#[must_use]
pub fn extract_client_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Unix timestamp of the window reset, for `X-RateLimit-Reset`.
fn reset_epoch(decision: &WindowDecision) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now + decision.retry_after_secs()
}
