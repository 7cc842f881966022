//! Middleware factory `rate_limit(limiter, key_fn)` from spec.md §4.8: a `nil` limiter disables
//! the check, an unidentifiable caller passes through, and a rejection carries `Retry-After`.

use crate::claims::UserClaims;
use crate::error::CoreError;
use crate::key_extractors;
use crate::rate_limit::{Decision, RateLimiter};
use crate::session::SESSION_COOKIE;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use std::net::SocketAddr;
use std::sync::Arc;

/// Extracts the rate-limit key for one request, or `None` to skip limiting it.
pub type KeyFn = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;

fn remote_addr(req: &Request) -> SocketAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0)
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)))
}

/// `client_ip` key extractor, keyed as `ip:<addr>` per spec.md §4.8.
#[must_use]
pub fn by_client_ip(req: &Request) -> Option<String> {
    key_extractors::client_ip(req.headers(), remote_addr(req)).map(|ip| format!("ip:{ip}"))
}

/// `session` key extractor.
#[must_use]
pub fn by_session(req: &Request) -> Option<String> {
    let jar = CookieJar::from_headers(req.headers());
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value());
    key_extractors::session(session_id, req.headers(), remote_addr(req))
}

/// `user_or_ip` key extractor.
#[must_use]
pub fn by_user_or_ip(req: &Request) -> Option<String> {
    let claims = req.extensions().get::<UserClaims>();
    key_extractors::user_or_ip(claims, req.headers(), remote_addr(req))
}

/// Shared state for one rate-limited route tier.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Option<Arc<RateLimiter>>,
    key_fn: KeyFn,
}

impl RateLimitState {
    /// `limiter = None` disables the check for this tier (spec.md §4.8's exempt endpoints).
    #[must_use]
    pub fn new(limiter: Option<Arc<RateLimiter>>, key_fn: KeyFn) -> Self {
        Self { limiter, key_fn }
    }

    #[must_use]
    pub fn exempt() -> Self {
        Self::new(None, Arc::new(by_client_ip))
    }
}

pub async fn enforce_rate_limit(State(state): State<RateLimitState>, req: Request, next: Next) -> Response {
    let Some(limiter) = state.limiter.as_ref() else {
        return next.run(req).await;
    };
    let Some(key) = (state.key_fn)(&req) else {
        return next.run(req).await;
    };

    match limiter.check(&key) {
        Decision::Allow => next.run(req).await,
        Decision::Deny { retry_after } => {
            CoreError::RateLimited { retry_after_secs: retry_after.as_secs().max(1) }.into_response()
        }
    }
}
