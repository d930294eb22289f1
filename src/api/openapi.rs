//! OpenAPI document for the HTTP surface.

use utoipa::OpenApi;

use super::handlers::{auth, health};
use crate::authn::UserView;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::signin::signin,
        auth::signup::signup,
        auth::signup::verify_email,
        auth::session::session,
        auth::session::signout,
        auth::mfa::mfa_verify,
        auth::mfa::mfa_enroll,
        auth::mfa::mfa_enroll_confirm,
    ),
    components(schemas(
        health::Health,
        UserView,
        auth::types::SigninRequest,
        auth::types::SessionResponse,
        auth::types::MfaChallengeResponse,
        auth::types::SignupRequest,
        auth::types::SignupResponse,
        auth::types::VerifyEmailRequest,
        auth::types::MfaVerifyRequest,
        auth::types::MfaEnrollResponse,
        auth::types::MfaEnrollConfirmRequest,
        auth::types::MfaEnrollConfirmResponse,
    )),
    tags(
        (name = "auth", description = "Authentication and session management"),
        (name = "health", description = "Service health")
    )
)]
struct ApiDoc;

/// The generated OpenAPI document.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for route in [
            "/health",
            "/v1/auth/signin",
            "/v1/auth/signup",
            "/v1/auth/verify-email",
            "/v1/auth/session",
            "/v1/auth/signout",
            "/v1/auth/mfa/verify",
            "/v1/auth/mfa/enroll",
            "/v1/auth/mfa/enroll/confirm",
        ] {
            assert!(
                paths.iter().any(|path| path.as_str() == route),
                "missing {route}"
            );
        }
    }
}
