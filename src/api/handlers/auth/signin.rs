//! Password login endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use std::sync::Arc;

use super::types::{MfaChallengeResponse, SessionResponse, SigninRequest};
use super::{client_info, error_response, with_session_cookie, CookieSettings};
use crate::api::rate_limit::{self, RatePolicy};
use crate::authn::{Authenticator, LoginOutcome};

#[utoipa::path(
    post,
    path = "/v1/auth/signin",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Authenticated, or MFA challenge issued", body = SessionResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 423, description = "Account temporarily locked"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "auth"
)]
pub async fn signin(
    headers: HeaderMap,
    auth: Extension<Arc<Authenticator>>,
    cookies: Extension<CookieSettings>,
    Json(body): Json<SigninRequest>,
) -> Response {
    let client = client_info(&headers);

    // The route-level layer is only a per-IP flood guard; this pair budget
    // is the binding auth limit, so its headers win on denial.
    let policy = RatePolicy::auth();
    let pair_key = format!(
        "{}:{}:{}",
        policy.name,
        client.ip_address.as_deref().unwrap_or("unknown"),
        body.email.trim().to_lowercase()
    );
    let decision = auth
        .limiter()
        .increment(&pair_key, policy.window, policy.max_requests);
    if !decision.allowed {
        let mut response = rate_limit::too_many_requests(&decision);
        rate_limit::stamp_headers(&mut response, policy.max_requests, &decision);
        return response;
    }

    match auth
        .authenticate(
            &body.email,
            body.password.expose_secret(),
            body.remember_me,
            &client,
        )
        .await
    {
        Ok(LoginOutcome::Authenticated(grant)) => {
            let max_age = (grant.expires_at - chrono::Utc::now()).num_seconds().max(0);
            let response = (
                StatusCode::OK,
                Json(SessionResponse {
                    user: grant.user.clone(),
                    expires_at: grant.expires_at,
                }),
            )
                .into_response();
            with_session_cookie(response, *cookies, &grant.token, max_age)
        }
        Ok(LoginOutcome::MfaRequired { challenge_token }) => (
            StatusCode::OK,
            Json(MfaChallengeResponse {
                mfa_required: true,
                challenge_token: challenge_token.to_string(),
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}
