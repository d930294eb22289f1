//! Session lookup and signout endpoints.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;

use super::types::SessionResponse;
use super::{error_response, extract_session_token, CookieSettings};
use crate::authn::Authenticator;

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 401, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, auth: Extension<Arc<Authenticator>>) -> Response {
    // A missing cookie and an expired session answer identically.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    match auth.session(&token).await {
        Ok(Some((record, user))) => (
            StatusCode::OK,
            Json(SessionResponse {
                user,
                expires_at: record.expires_at,
            }),
        )
            .into_response(),
        Ok(None) => StatusCode::UNAUTHORIZED.into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/signout",
    responses(
        (status = 200, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn signout(
    headers: HeaderMap,
    auth: Extension<Arc<Authenticator>>,
    cookies: Extension<CookieSettings>,
) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        if let Err(err) = auth.logout(&token).await {
            error!("failed to delete session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response = StatusCode::OK.into_response();
    if let Some(cookie) = cookies.clear_session_cookie() {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}
