//! Backend-for-Frontend OAuth password-grant flow and opaque session management
//! (spec.md §4.3).
//!
//! The TTL half of this is grounded on the teacher's `UpstreamEndpointCache`
//! (`endpoint_cache.rs`); the token-signing half borrows the teacher's
//! `TenantSigner` shape (`tenant_token.rs`) for the CSRF token, generalized from
//! an HMAC-signed value to a plain random one since spec.md §3 calls for an opaque,
//! unsigned CSRF token rather than a verifiable one.

use crate::claims::{Role, UserClaims};
use crate::ttl_cache::TtlCache;
use rand_core::{OsRng, TryRngCore as _};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Name of the `HttpOnly` cookie carrying the opaque session id.
pub const SESSION_COOKIE: &str = "DIEGO_SESSION";
/// Name of the non-`HttpOnly` cookie carrying the double-submit CSRF token.
pub const CSRF_COOKIE: &str = "DIEGO_CSRF";
/// Name of the header the SPA must echo the CSRF cookie's value into.
pub const CSRF_HEADER: &str = "x-csrf-token";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not reach UAA: {0}")]
    Upstream(String),
    #[error("invalid username or password")]
    InvalidCredentials,
}

/// Server-side authentication state for one browser session.
///
/// Tokens never leave the server; handlers only ever see [`UserClaims`] derived from a
/// session, never this struct.
#[derive(Clone)]
pub struct Session {
    pub id: String,
    pub username: String,
    pub user_id: String,
    access_token: String,
    #[allow(dead_code)] // held for a future refresh flow; see spec.md §9 open question.
    refresh_token: Option<String>,
    pub created_at: Instant,
    pub csrf_token: String,
    pub role: Role,
}

pub struct LoginOutcome {
    pub session_id: String,
    pub csrf_token: String,
    pub username: String,
    pub user_id: String,
    pub ttl: Duration,
}

#[derive(Deserialize)]
struct CfInfo {
    links: CfInfoLinks,
}

#[derive(Deserialize)]
struct CfInfoLinks {
    login: CfInfoHref,
}

#[derive(Deserialize)]
struct CfInfoHref {
    href: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: u64,
}

struct Inner {
    http: reqwest::Client,
    cf_api_url: String,
    uaa_url: RwLock<Option<String>>,
    sessions: TtlCache<Session>,
}

/// Implements login/validate/logout/whoami for cookie-based sessions backed by UAA.
#[derive(Clone)]
pub struct SessionService {
    inner: Arc<Inner>,
}

impl SessionService {
    #[must_use]
    pub fn new(http: reqwest::Client, cf_api_url: String) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                cf_api_url,
                uaa_url: RwLock::new(None),
                sessions: TtlCache::new(),
            }),
        }
    }

    /// Resolve and cache the UAA base URL from `<cf_api>/v3/info`.
    async fn uaa_url(&self) -> Result<String, SessionError> {
        if let Some(url) = self.inner.uaa_url.read().await.clone() {
            return Ok(url);
        }
        let info_url = format!("{}/v3/info", self.inner.cf_api_url.trim_end_matches('/'));
        let info: CfInfo = self
            .inner
            .http
            .get(&info_url)
            .send()
            .await
            .map_err(|e| SessionError::Upstream(e.to_string()))?
            .error_for_status()
            .map_err(|e| SessionError::Upstream(e.to_string()))?
            .json()
            .await
            .map_err(|e| SessionError::Upstream(e.to_string()))?;
        let url = info.links.login.href;
        *self.inner.uaa_url.write().await = Some(url.clone());
        Ok(url)
    }

    /// Exchange `(username, password)` for UAA tokens via the password grant, then mint an
    /// opaque session id and CSRF token.
    ///
    /// # Errors
    /// [`SessionError::InvalidCredentials`] on a UAA `4xx`, [`SessionError::Upstream`] on any
    /// other failure to reach UAA.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, SessionError> {
        let uaa = self.uaa_url().await?;
        let token_url = format!("{}/oauth/token", uaa.trim_end_matches('/'));

        let resp = self
            .inner
            .http
            .post(&token_url)
            .basic_auth("cf", Some(""))
            .form(&[
                ("grant_type", "password"),
                ("username", username),
                ("password", password),
                ("response_type", "token"),
            ])
            .send()
            .await
            .map_err(|e| SessionError::Upstream(e.to_string()))?;

        if resp.status().is_client_error() {
            return Err(SessionError::InvalidCredentials);
        }
        let token: TokenResponse = resp
            .error_for_status()
            .map_err(|e| SessionError::Upstream(e.to_string()))?
            .json()
            .await
            .map_err(|e| SessionError::Upstream(e.to_string()))?;

        let session_id = random_hex_token(16); // 128 bits
        let csrf_token = random_hex_token(32); // 256 bits
        let ttl = Duration::from_secs(token.expires_in);

        // UAA doesn't echo username/user_id in the password grant response in every
        // deployment; derive what we can from the access token's own claims without
        // re-verifying the signature (we already trust UAA, having just obtained it
        // over an authenticated channel).
        let (username_out, user_id_out, role) = unverified_identity(&token.access_token, username);

        let session = Session {
            id: session_id.clone(),
            username: username_out.clone(),
            user_id: user_id_out.clone(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            created_at: Instant::now(),
            csrf_token: csrf_token.clone(),
            role,
        };
        self.inner.sessions.insert(session_id.clone(), session, ttl);

        Ok(LoginOutcome {
            session_id,
            csrf_token,
            username: username_out,
            user_id: user_id_out,
            ttl,
        })
    }

    /// Return claims for a live session, or `None` if the id is unknown or expired.
    #[must_use]
    pub fn validate(&self, session_id: &str) -> Option<UserClaims> {
        if session_id.is_empty() {
            return None;
        }
        let session = self.inner.sessions.get(session_id)?;
        Some(UserClaims::new(session.username, session.user_id, session.role))
    }

    /// Look up the CSRF token bound to a session, for the CSRF middleware's comparison.
    #[must_use]
    pub fn csrf_token_for(&self, session_id: &str) -> Option<String> {
        self.inner.sessions.get(session_id).map(|s| s.csrf_token)
    }

    pub fn logout(&self, session_id: &str) {
        self.inner.sessions.remove(session_id);
    }

    #[must_use]
    pub fn whoami(&self, session_id: &str) -> Option<(String, String)> {
        let session = self.inner.sessions.get(session_id)?;
        Some((session.username, session.user_id))
    }
}

fn random_hex_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.try_fill_bytes(&mut buf).expect("os rng available");
    hex::encode(buf)
}

/// Best-effort, non-authoritative read of `user_name`/`user_id` from a JWT payload, used only
/// to populate the session record right after a successful password grant. This is never used
/// for authorization: every subsequent request re-validates through [`crate::jwks::JwksClient`]
/// or this session's own id lookup, never by re-decoding the stored access token (spec.md §9
/// "the non-JWKS parseJWT helper ... MUST NOT be reachable when Bearer auth is configured").
fn unverified_identity(access_token: &str, fallback_username: &str) -> (String, String, Role) {
    use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

    #[derive(Deserialize)]
    struct Payload {
        #[serde(default)]
        user_name: Option<String>,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        scope: Vec<String>,
    }

    let parse = || -> Option<Payload> {
        let payload_b64 = access_token.split('.').nth(1)?;
        let json = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
        serde_json::from_slice(&json).ok()
    };

    match parse() {
        Some(p) => (
            p.user_name.unwrap_or_else(|| fallback_username.to_string()),
            p.user_id.unwrap_or_default(),
            Role::from_scopes(p.scope.iter().map(String::as_str)),
        ),
        None => (fallback_username.to_string(), String::new(), Role::Viewer),
    }
}
