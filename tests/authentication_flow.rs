//! End-to-end flows over in-memory stores, plus router-level checks for the
//! rate-limit headers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::util::ServiceExt;

use warden::api::{self, ApiConfig};
use warden::authn::{AuthConfig, AuthError, Authenticator, ClientInfo, LoginOutcome};
use warden::password::HashParams;
use warden::session::{InMemorySessionStore, SessionStore};
use warden::store::{InMemoryUserStore, UserStore};
use warden::throttle::LockoutConfig;

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "Tr4verse!Mountain";

fn build_core(lockout: LockoutConfig) -> Authenticator {
    let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    Authenticator::new(AuthConfig::default(), users, sessions)
        .expect("default Argon2 parameters are valid")
        .with_hash_params(HashParams::new().with_memory_cost(1024).with_time_cost(1))
        .expect("test Argon2 parameters are valid")
        .with_lockout_config(lockout)
}

fn core() -> Authenticator {
    build_core(LockoutConfig::default())
}

#[tokio::test]
async fn register_authenticate_lockout_and_recovery() {
    // Short lockout so the test can wait it out in real time.
    let core = build_core(LockoutConfig {
        lockout_duration: Duration::from_millis(50),
        ..LockoutConfig::default()
    });
    let client = ClientInfo::default();

    core.register(EMAIL, PASSWORD, Some("Alice".into()), None)
        .await
        .expect("registration succeeds");

    // Correct password yields a ~24h session.
    let LoginOutcome::Authenticated(grant) = core
        .authenticate(EMAIL, PASSWORD, false, &client)
        .await
        .expect("first login succeeds")
    else {
        panic!("expected a session");
    };
    let hours = (grant.expires_at - chrono::Utc::now()).num_hours();
    assert!((23..=24).contains(&hours), "session TTL ~24h, got {hours}h");

    // Five wrong passwords lock the account.
    for _ in 0..5 {
        let result = core
            .authenticate(EMAIL, "Wrong!Password9", false, &client)
            .await;
        assert!(result.is_err());
    }

    // Even the correct password is rejected while locked.
    let locked = core.authenticate(EMAIL, PASSWORD, false, &client).await;
    assert!(matches!(locked, Err(AuthError::AccountLocked { .. })));

    // Past expiry the lock clears and the correct password works again.
    tokio::time::sleep(Duration::from_millis(80)).await;
    let recovered = core.authenticate(EMAIL, PASSWORD, false, &client).await;
    assert!(matches!(recovered, Ok(LoginOutcome::Authenticated(_))));
}

#[tokio::test]
async fn remember_me_session_lasts_thirty_days() {
    let core = core();
    core.register(EMAIL, PASSWORD, None, None).await.expect("register");

    let LoginOutcome::Authenticated(grant) = core
        .authenticate(EMAIL, PASSWORD, true, &ClientInfo::default())
        .await
        .expect("login succeeds")
    else {
        panic!("expected a session");
    };
    let days = (grant.expires_at - chrono::Utc::now()).num_days();
    assert!((29..=30).contains(&days), "remember-me TTL ~30d, got {days}d");
}

fn router() -> axum::Router {
    let config = ApiConfig {
        port: 0,
        cookie_secure: false,
        cors_origin: None,
    };
    api::router(Arc::new(core()), &config)
}

fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "203.0.113.10")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn http_signup_signin_session_signout() {
    let app = router();

    let response = app
        .clone()
        .oneshot(json_request(
            "/v1/auth/signup",
            json!({"email": EMAIL, "password": PASSWORD, "firstName": "Alice"}),
        ))
        .await
        .expect("signup request");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request(
            "/v1/auth/signin",
            json!({"email": EMAIL, "password": PASSWORD}),
        ))
        .await
        .expect("signin request");
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(ToString::to_string)
        .expect("signin sets the session cookie");
    assert!(cookie.starts_with("warden_session="));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/auth/session")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("session request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/auth/signout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("signout request");
    assert_eq!(response.status(), StatusCode::OK);

    // The session is gone after signout.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/auth/session")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("session request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_credentials_answer_unauthorized() {
    let app = router();
    let response = app
        .oneshot(json_request(
            "/v1/auth/signin",
            json!({"email": "ghost@example.com", "password": "Wrong!Password9"}),
        ))
        .await
        .expect("signin request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rate_limit_headers_and_429_on_the_auth_policy() {
    let app = router();

    // First request carries the flood-guard headers.
    let response = app
        .clone()
        .oneshot(json_request(
            "/v1/auth/signin",
            json!({"email": EMAIL, "password": "Wrong!Password9"}),
        ))
        .await
        .expect("signin request");
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-limit")
            .and_then(|value| value.to_str().ok()),
        Some("100")
    );
    assert!(response.headers().contains_key("x-ratelimit-remaining"));
    assert!(response.headers().contains_key("x-ratelimit-reset"));

    // The pair budget allows 10 per window; the 11th for the same
    // (ip, email) answers 429 with the pair ceiling in the headers.
    for _ in 0..9 {
        let _ = app
            .clone()
            .oneshot(json_request(
                "/v1/auth/signin",
                json!({"email": EMAIL, "password": "Wrong!Password9"}),
            ))
            .await
            .expect("signin request");
    }
    let response = app
        .oneshot(json_request(
            "/v1/auth/signin",
            json!({"email": EMAIL, "password": "Wrong!Password9"}),
        ))
        .await
        .expect("signin request");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-limit")
            .and_then(|value| value.to_str().ok()),
        Some("10")
    );
    assert_eq!(
        response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok()),
        Some("0")
    );
}

#[tokio::test]
async fn pair_keying_leaves_fresh_emails_unblocked() {
    let app = router();

    // Exhaust the pair budget for ten distinct accounts from one IP.
    for n in 0..10 {
        let response = app
            .clone()
            .oneshot(json_request(
                "/v1/auth/signin",
                json!({"email": format!("user{n}@example.com"), "password": "Wrong!Password9"}),
            ))
            .await
            .expect("signin request");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // An 11th request for a never-seen (ip, email) pair is still allowed;
    // only the per-IP flood guard could stop it, and its ceiling is higher.
    let response = app
        .oneshot(json_request(
            "/v1/auth/signin",
            json!({"email": "fresh@example.com", "password": "Wrong!Password9"}),
        ))
        .await
        .expect("signin request");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verify_email_runs_under_the_strict_policy() {
    let app = router();

    // Three bogus tokens per hour are allowed, the fourth is throttled.
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(json_request(
                "/v1/auth/verify-email",
                json!({"token": "bogus"}),
            ))
            .await
            .expect("verify-email request");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
    let response = app
        .oneshot(json_request(
            "/v1/auth/verify-email",
            json!({"token": "bogus"}),
        ))
        .await
        .expect("verify-email request");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
}
