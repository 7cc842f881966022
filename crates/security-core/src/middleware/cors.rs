//! Origin allow-list CORS middleware (spec.md §4.7).
//!
//! Deliberately hand-rolled rather than built on `tower-http::cors`: the spec's "echo the
//! origin, never `*`, emit nothing at all for a disallowed origin" contract is narrower than a
//! general-purpose CORS layer, and the teacher corpus favors small purpose-built middleware over
//! pulling in a tower-http layer for a single policy.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-CSRF-Token";

/// The configured cross-origin allow-list.
#[derive(Clone)]
pub struct CorsState {
    allowed_origins: Arc<Vec<String>>,
}

impl CorsState {
    #[must_use]
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self { allowed_origins: Arc::new(allowed_origins) }
    }

    fn is_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

/// Implements spec.md §4.7: echo an allow-listed origin, stay silent for anything else, and
/// short-circuit preflight `OPTIONS` requests once headers are set.
pub async fn apply_cors(State(state): State<CorsState>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|o| state.is_allowed(o))
        .map(str::to_string);

    let is_preflight = req.method() == Method::OPTIONS;

    let mut response = if is_preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    if let Some(origin) = origin {
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
    }

    response
}
