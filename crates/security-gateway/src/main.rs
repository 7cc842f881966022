//! Axum server wiring `diego-security-core`'s middleware chain into an HTTP listener
//! (SPEC_FULL.md §2, §4.10).

mod config;
mod handlers;

use axum::routing::{get, post};
use axum::Router;
use config::Config;
use diego_security_core::chain::{self, chain};
use diego_security_core::middleware::{
    self, AuthState, CorsState, RateLimitState, RoleGate, apply_cors, authenticate, enforce_rate_limit,
    log_requests, require_role, verify_csrf,
};
use diego_security_core::{JwksClient, RateLimiter, Role, SessionService};
use handlers::auth::{AuthHandlerState, healthz, login, logout, me};
use handlers::demo::{infrastructure_manual, scenario_compare};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Wraps a `from_fn_with_state(state, f)` middleware as a `chain::Layer`, deferring the
/// `.layer()` call itself so [`chain`] controls the order it's applied in.
macro_rules! mw {
    ($state:expr, $f:expr) => {{
        let state = $state;
        Box::new(move |router: Router| router.layer(axum::middleware::from_fn_with_state(state, $f))) as chain::Layer
    }};
}

/// Wraps a stateless `from_fn(f)` middleware as a `chain::Layer`.
macro_rules! mw_stateless {
    ($f:expr) => {
        Box::new(move |router: Router| router.layer(axum::middleware::from_fn($f))) as chain::Layer
    };
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env()?;
    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .danger_accept_invalid_certs(config.cf_skip_ssl_validation)
        .build()?;

    let jwks = match config.uaa_issuer.as_deref() {
        Some(issuer) => Some(JwksClient::connect(http.clone(), issuer).await?),
        None => {
            tracing::warn!("DIEGO_GATEWAY_UAA_ISSUER not set; Bearer authentication is unavailable");
            None
        }
    };

    let cf_api_url = config.cf_api_url.clone().unwrap_or_default();
    let sessions = SessionService::new(http, cf_api_url);

    let auth_state = AuthState::new(config.auth_mode, jwks, Some(sessions.clone()));
    let auth_handler_state = AuthHandlerState { sessions, cookie_secure: config.cookie_secure };
    let cors_state = CorsState::new(config.cors_allowed_origins.clone());

    let auth_limiter = RateLimiter::new(config.rate_limits.auth.limit, config.rate_limits.auth.window);
    let write_limiter = RateLimiter::new(config.rate_limits.write.limit, config.rate_limits.write.window);

    // Each subtree below builds its own copy of the chain from spec.md §2:
    //   Rate Limit -> Authentication -> Role Gate -> CSRF -> Handler
    // (minus whichever stages don't apply to it), via the declarative `chain` helper so the
    // call sites read top-to-bottom in the order the request actually flows.

    // Login is exempt from both the CSRF layer (it's the route that mints the CSRF token the
    // layer later checks) and the authentication layer (a fresh caller has no credentials yet
    // to authenticate with — gating login on `authenticate` would make `AuthMode::Required`
    // permanently lock every caller out of the one route that lets them bootstrap a session).
    // Both exemptions are by router placement rather than a path check (DESIGN.md).
    let login_router = chain(
        Router::new().route("/api/v1/auth/login", post(login)).with_state(auth_handler_state.clone()),
        vec![mw!(
            RateLimitState::new(Some(Arc::clone(&auth_limiter)), Arc::new(middleware::rate_limit::by_client_ip)),
            enforce_rate_limit
        )],
    );

    let csrf_protected_auth_router = chain(
        Router::new()
            .route("/api/v1/auth/logout", post(logout))
            .route("/api/v1/auth/me", get(me))
            .with_state(auth_handler_state),
        vec![mw!(auth_state.clone(), authenticate), mw_stateless!(verify_csrf)],
    );

    let write_router = chain(
        Router::new().route("/scenario/compare", post(scenario_compare)),
        vec![
            mw!(
                RateLimitState::new(Some(Arc::clone(&write_limiter)), Arc::new(middleware::rate_limit::by_user_or_ip)),
                enforce_rate_limit
            ),
            mw!(auth_state.clone(), authenticate),
            mw_stateless!(verify_csrf),
        ],
    );

    let operator_router = chain(
        Router::new().route("/infrastructure/manual", post(infrastructure_manual)),
        vec![
            mw!(
                RateLimitState::new(Some(write_limiter), Arc::new(middleware::rate_limit::by_user_or_ip)),
                enforce_rate_limit
            ),
            mw!(auth_state, authenticate),
            mw!(RoleGate::new(Role::Operator), require_role),
            mw_stateless!(verify_csrf),
        ],
    );

    // Health is exempt from rate limiting, auth, and CSRF entirely (spec.md §4.8 "health and
    // docs are exempt"); it still gets request logging and CORS headers like everything else.
    let health_router = Router::new().route("/healthz", get(healthz));

    let app = chain(
        Router::new()
            .merge(login_router)
            .merge(csrf_protected_auth_router)
            .merge(write_router)
            .merge(operator_router)
            .merge(health_router),
        vec![mw_stateless!(log_requests), mw!(cors_state, apply_cors)],
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
