//! HTTP surface: router assembly and server startup.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, warn, Span};
use ulid::Ulid;
use url::Url;

use crate::authn::Authenticator;

pub mod handlers;
pub mod openapi;
pub mod rate_limit;

pub use openapi::openapi;

use rate_limit::{RateLimitState, RatePolicy};

/// Server-level settings that are not authentication policy.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub port: u16,
    /// Mark session cookies `Secure`. Off for plain-HTTP development.
    pub cookie_secure: bool,
    /// Exact allowed CORS origin; absent means no cross-origin access.
    pub cors_origin: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cookie_secure: true,
            cors_origin: None,
        }
    }
}

/// Assemble the application router over a shared authentication core.
///
/// Route groups carry different rate-limit policies: auth endpoints get a
/// per-IP flood guard (the tight budget is the per-(ip, email) pair inside
/// the handlers), email verification the strict budget, `/health` the
/// monitoring budget, everything else the generic API budget.
#[must_use]
pub fn router(auth: Arc<Authenticator>, config: &ApiConfig) -> Router {
    let limiter = auth.limiter();

    // The per-IP layer here is only a flood guard; the binding auth budget
    // is the (ip, email) pair charged inside signin/signup.
    let auth_routes = Router::new()
        .route("/v1/auth/signin", post(handlers::auth::signin))
        .route("/v1/auth/signup", post(handlers::auth::signup))
        .route("/v1/auth/mfa/verify", post(handlers::auth::mfa_verify))
        .route_layer(middleware::from_fn_with_state(
            RateLimitState::new(Arc::clone(&limiter), RatePolicy::auth_per_ip()),
            rate_limit::enforce,
        ));

    let verification_routes = Router::new()
        .route("/v1/auth/verify-email", post(handlers::auth::verify_email))
        .route_layer(middleware::from_fn_with_state(
            RateLimitState::new(Arc::clone(&limiter), RatePolicy::strict()),
            rate_limit::enforce,
        ));

    let session_routes = Router::new()
        .route(
            "/v1/auth/signout",
            post(handlers::auth::signout),
        )
        .route("/v1/auth/session", get(handlers::auth::session))
        .route("/v1/auth/mfa/enroll", post(handlers::auth::mfa_enroll))
        .route(
            "/v1/auth/mfa/enroll/confirm",
            post(handlers::auth::mfa_enroll_confirm),
        )
        .route_layer(middleware::from_fn_with_state(
            RateLimitState::new(Arc::clone(&limiter), RatePolicy::api()),
            rate_limit::enforce,
        ));

    let health_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route_layer(middleware::from_fn_with_state(
            RateLimitState::new(limiter, RatePolicy::monitoring()),
            rate_limit::enforce,
        ));

    let cookie_secure = config.cookie_secure;
    Router::new()
        .merge(auth_routes)
        .merge(verification_routes)
        .merge(session_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &Request<Body>| {
                        HeaderValue::from_str(Ulid::new().to_string().as_str()).ok()
                    },
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors_layer(config))
                .layer(Extension(auth))
                .layer(Extension(handlers::auth::CookieSettings::new(
                    cookie_secure,
                ))),
        )
}

/// Bind and serve until shutdown.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(config: ApiConfig, auth: Arc<Authenticator>) -> Result<()> {
    let sweeper_auth = Arc::clone(&auth);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5 * 60));
        loop {
            interval.tick().await;
            sweeper_auth.sweep_expired().await;
        }
    });

    let app = router(auth, &config);
    let listener = TcpListener::bind(format!("::0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true);
    match config.cors_origin.as_deref().and_then(origin_header) {
        Some(origin) => layer.allow_origin(AllowOrigin::exact(origin)),
        None => layer,
    }
}

/// Normalize a configured origin to `scheme://host[:port]`. A value that
/// does not parse is ignored rather than silently allowed.
fn origin_header(origin: &str) -> Option<HeaderValue> {
    let parsed = Url::parse(origin)
        .map_err(|err| warn!("ignoring invalid CORS origin {origin}: {err}"))
        .ok()?;
    let host = parsed.host_str()?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    HeaderValue::from_str(&format!("{}://{host}{port}", parsed.scheme())).ok()
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
