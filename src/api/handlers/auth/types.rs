//! Request and response bodies for the auth endpoints.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::authn::UserView;

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    pub email: String,
    /// Redacted in Debug output so request logging can never leak it.
    #[schema(value_type = String)]
    pub password: SecretString,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserView,
    pub expires_at: DateTime<Utc>,
}

/// Returned instead of a session when a second factor is required.
#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MfaChallengeResponse {
    pub mfa_required: bool,
    pub challenge_token: String,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    #[schema(value_type = String)]
    pub password: SecretString,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub user: UserView,
    pub requires_verification: bool,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MfaVerifyRequest {
    pub challenge_token: String,
    pub code: String,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MfaEnrollResponse {
    pub secret: String,
    pub provisioning_uri: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct MfaEnrollConfirmRequest {
    pub code: String,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MfaEnrollConfirmResponse {
    /// Plaintext backup codes, shown exactly once.
    pub backup_codes: Vec<String>,
}
