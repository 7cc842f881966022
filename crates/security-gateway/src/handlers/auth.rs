//! Login / logout / whoami BFF endpoints (spec.md §4.14, §6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use diego_security_core::{CSRF_COOKIE, CoreError, SESSION_COOKIE, SessionError, SessionService, UserClaims};
use serde::{Deserialize, Serialize};

/// State the auth handlers need beyond what the middleware chain already attaches.
#[derive(Clone)]
pub struct AuthHandlerState {
    pub sessions: SessionService,
    pub cookie_secure: bool,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginSuccessBody {
    success: bool,
    username: String,
    user_id: String,
}

#[derive(Serialize)]
struct LoginFailureBody {
    success: bool,
    error: String,
}

#[derive(Serialize)]
struct LogoutBody {
    success: bool,
}

#[derive(Serialize)]
pub(crate) struct WhoAmIBody {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
}

fn build_cookie(name: &'static str, value: String, ttl_secs: u64, http_only: bool, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(http_only)
        .same_site(SameSite::Strict)
        .secure(secure)
        .path("/")
        .max_age(time::Duration::seconds(ttl_secs.min(i64::MAX as u64) as i64))
        .build()
}

fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .same_site(SameSite::Strict)
        .secure(secure)
        .path("/")
        .max_age(time::Duration::seconds(-1))
        .build()
}

/// `POST /api/v1/auth/login` (spec.md §4.3 step 6, §6).
///
/// Not gated by the CSRF layer — this route is mounted on the sub-tree that sits in front of
/// it, since a caller with no session yet cannot present a CSRF token.
pub async fn login(
    State(state): State<AuthHandlerState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Response {
    match state.sessions.login(&body.username, &body.password).await {
        Ok(outcome) => {
            let ttl_secs = outcome.ttl.as_secs();
            let jar = jar
                .add(build_cookie(SESSION_COOKIE, outcome.session_id, ttl_secs, true, state.cookie_secure))
                .add(build_cookie(CSRF_COOKIE, outcome.csrf_token, ttl_secs, false, state.cookie_secure));
            (
                jar,
                Json(LoginSuccessBody { success: true, username: outcome.username, user_id: outcome.user_id }),
            )
                .into_response()
        }
        Err(SessionError::InvalidCredentials) => (
            StatusCode::UNAUTHORIZED,
            Json(LoginFailureBody { success: false, error: "invalid username or password".to_string() }),
        )
            .into_response(),
        Err(SessionError::Upstream(msg)) => CoreError::Upstream(msg).into_response(),
    }
}

/// `POST /api/v1/auth/logout` (spec.md §4.3, §6).
pub async fn logout(State(state): State<AuthHandlerState>, jar: CookieJar) -> Response {
    if let Some(session_id) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        state.sessions.logout(&session_id);
    }
    let jar = jar
        .add(expired_cookie(SESSION_COOKIE, state.cookie_secure))
        .add(expired_cookie(CSRF_COOKIE, state.cookie_secure));
    (jar, Json(LogoutBody { success: true })).into_response()
}

/// `GET /api/v1/auth/me` (spec.md §6). Identity comes from whatever the authentication
/// middleware already attached, so this mirrors any authenticated request, not just cookie ones.
pub async fn me(claims: Option<Extension<UserClaims>>) -> Json<WhoAmIBody> {
    match claims {
        Some(Extension(claims)) if !claims.user_id.is_empty() => Json(WhoAmIBody {
            authenticated: true,
            username: Some(claims.username),
            user_id: Some(claims.user_id),
        }),
        _ => Json(WhoAmIBody { authenticated: false, username: None, user_id: None }),
    }
}

/// `GET /healthz` — ambient operational surface, unauthenticated and unrated
/// (SPEC_FULL.md §4.14).
pub async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
