//! Double-submit CSRF validation for cookie-authenticated, state-changing requests
//! (spec.md §4.6).
//!
//! Mount this layer only on the router sub-tree that excludes `/api/v1/auth/login` — the login
//! route is exempted by placement, not by a path check here, per the open-question decision in
//! `DESIGN.md`.

use crate::error::CoreError;
use crate::session::{CSRF_COOKIE, CSRF_HEADER, SESSION_COOKIE};
use axum::extract::Request;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use subtle::ConstantTimeEq;

/// Implements spec.md §4.6's three skip conditions plus the constant-time comparison.
pub async fn verify_csrf(req: Request, next: Next) -> Response {
    if matches!(req.method(), &Method::GET | &Method::HEAD | &Method::OPTIONS) {
        return next.run(req).await;
    }
    if req.headers().contains_key(axum::http::header::AUTHORIZATION) {
        return next.run(req).await;
    }

    let jar = CookieJar::from_headers(req.headers());
    let Some(session_cookie) = jar.get(SESSION_COOKIE) else {
        return next.run(req).await;
    };
    if session_cookie.value().is_empty() {
        return next.run(req).await;
    }

    let cookie_token = jar.get(CSRF_COOKIE).map(|c| c.value()).unwrap_or_default();
    let header_token = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if cookie_token.is_empty()
        || header_token.is_empty()
        || cookie_token.as_bytes().ct_eq(header_token.as_bytes()).unwrap_u8() == 0
    {
        return CoreError::Authorization("CSRF token missing or invalid").into_response();
    }

    next.run(req).await
}
