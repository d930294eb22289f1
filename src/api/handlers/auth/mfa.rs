//! MFA verification and TOTP enrollment endpoints.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::types::{
    MfaEnrollConfirmRequest, MfaEnrollConfirmResponse, MfaEnrollResponse, MfaVerifyRequest,
    SessionResponse,
};
use super::{client_info, error_response, extract_session_token, with_session_cookie, CookieSettings};
use crate::authn::{Authenticator, UserView};

#[utoipa::path(
    post,
    path = "/v1/auth/mfa/verify",
    request_body = MfaVerifyRequest,
    responses(
        (status = 200, description = "Second factor accepted, session created", body = SessionResponse),
        (status = 401, description = "Invalid code or challenge token"),
        (status = 429, description = "Too many attempts")
    ),
    tag = "auth"
)]
pub async fn mfa_verify(
    headers: HeaderMap,
    auth: Extension<Arc<Authenticator>>,
    cookies: Extension<CookieSettings>,
    Json(body): Json<MfaVerifyRequest>,
) -> Response {
    let client = client_info(&headers);
    match auth
        .verify_mfa(&body.challenge_token, &body.code, &client)
        .await
    {
        Ok(grant) => {
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
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/mfa/enroll",
    responses(
        (status = 200, description = "Enrollment started", body = MfaEnrollResponse),
        (status = 401, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn mfa_enroll(headers: HeaderMap, auth: Extension<Arc<Authenticator>>) -> Response {
    let Some(user) = current_user(&headers, &auth).await else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match auth.begin_totp_enrollment(user.id).await {
        Ok(enrollment) => (
            StatusCode::OK,
            Json(MfaEnrollResponse {
                secret: enrollment.secret,
                provisioning_uri: enrollment.provisioning_uri,
            }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/mfa/enroll/confirm",
    request_body = MfaEnrollConfirmRequest,
    responses(
        (status = 200, description = "MFA enabled, backup codes issued", body = MfaEnrollConfirmResponse),
        (status = 401, description = "No active session or invalid code")
    ),
    tag = "auth"
)]
pub async fn mfa_enroll_confirm(
    headers: HeaderMap,
    auth: Extension<Arc<Authenticator>>,
    Json(body): Json<MfaEnrollConfirmRequest>,
) -> Response {
    let Some(user) = current_user(&headers, &auth).await else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match auth.confirm_totp_enrollment(user.id, &body.code).await {
        Ok(backup_codes) => (
            StatusCode::OK,
            Json(MfaEnrollConfirmResponse { backup_codes }),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

async fn current_user(headers: &HeaderMap, auth: &Authenticator) -> Option<UserView> {
    let token = extract_session_token(headers)?;
    auth.session(&token)
        .await
        .ok()
        .flatten()
        .map(|(_, user)| user)
}
