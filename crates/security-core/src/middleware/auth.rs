//! Authentication middleware: resolves a caller's [`UserClaims`] from a Bearer token or the
//! session cookie, or rejects the request (spec.md §4.4).
//!
//! Grounded on the teacher's `mcp/auth.rs::authorize_jwt_request` — extract the bearer token,
//! reject with a specific message on each distinct failure, never echo the token back —
//! generalized to also try the session cookie path when no bearer token is present.

use crate::claims::UserClaims;
use crate::error::CoreError;
use crate::jwks::JwksClient;
use crate::session::{SESSION_COOKIE, SessionService};
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

/// How strictly the authentication layer enforces identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No identity is resolved; every request proceeds anonymously.
    Disabled,
    /// Identity is resolved when present; requests without credentials proceed anonymously.
    Optional,
    /// Requests without a valid Bearer token or session are rejected.
    Required,
}

/// Shared state for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    mode: AuthMode,
    jwks: Option<JwksClient>,
    sessions: Option<SessionService>,
}

impl AuthState {
    #[must_use]
    pub fn new(mode: AuthMode, jwks: Option<JwksClient>, sessions: Option<SessionService>) -> Self {
        Self { mode, jwks, sessions }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Implements spec.md §4.4's four-step algorithm.
pub async fn authenticate(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    if state.mode == AuthMode::Disabled {
        return next.run(req).await;
    }

    let headers = req.headers().clone();

    if let Some(token) = bearer_token(&headers) {
        let Some(jwks) = state.jwks.as_ref() else {
            return CoreError::Authentication("Bearer authentication unavailable").into_response();
        };
        return match jwks.verify_and_parse(token).await {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                next.run(req).await
            }
            Err(_) => CoreError::Authentication("Invalid bearer token").into_response(),
        };
    }

    if let Some(sessions) = state.sessions.as_ref() {
        let jar = CookieJar::from_headers(&headers);
        if let Some(session_id) = jar.get(SESSION_COOKIE).map(|c| c.value()) {
            if !session_id.is_empty() {
                return match sessions.validate(session_id) {
                    Some(claims) => {
                        req.extensions_mut().insert(claims);
                        next.run(req).await
                    }
                    None => CoreError::Authentication("Invalid session").into_response(),
                };
            }
        }
    }

    if state.mode == AuthMode::Required {
        return CoreError::Authentication("Authentication required").into_response();
    }
    req.extensions_mut().insert(UserClaims::anonymous());
    next.run(req).await
}
