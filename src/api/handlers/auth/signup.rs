//! Registration and email verification endpoints.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::debug;

use super::types::{SignupRequest, SignupResponse, VerifyEmailRequest};
use super::{client_info, error_response};
use crate::api::rate_limit::{self, RatePolicy};
use crate::authn::Authenticator;

#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, verification pending", body = SignupResponse),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Password rejected by policy"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "auth"
)]
pub async fn signup(
    headers: HeaderMap,
    auth: Extension<Arc<Authenticator>>,
    Json(body): Json<SignupRequest>,
) -> Response {
    let client = client_info(&headers);

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
        .register(
            &body.email,
            body.password.expose_secret(),
            body.first_name,
            body.last_name,
        )
        .await
    {
        Ok(registration) => {
            // The raw token goes to the email collaborator only. Logged at
            // debug for local development without a mail sink.
            debug!(
                user_id = %registration.user.id,
                token = %registration.verification_token,
                "verification token issued"
            );
            (
                StatusCode::CREATED,
                Json(SignupResponse {
                    user: registration.user,
                    requires_verification: true,
                }),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 204, description = "Email verified"),
        (status = 422, description = "Invalid or expired verification token")
    ),
    tag = "auth"
)]
pub async fn verify_email(
    auth: Extension<Arc<Authenticator>>,
    Json(body): Json<VerifyEmailRequest>,
) -> Response {
    match auth.verify_email(&body.token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}
