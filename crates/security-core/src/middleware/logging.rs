//! Per-request correlation id, path sanitization, and structured request/response logging
//! (spec.md §4.9).

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use rand_core::{OsRng, TryRngCore as _};
use std::time::Instant;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Strip ASCII control characters (`0..=31`, `127`) from a request path before it is logged or
/// echoed, to prevent log injection via embedded newlines or escape sequences. Query strings and
/// percent-encoded bytes are left untouched — only raw control bytes are removed.
#[must_use]
pub fn sanitize_path(path: &str) -> String {
    path.chars().filter(|c| !c.is_ascii_control()).collect()
}

fn random_request_id() -> String {
    let mut buf = [0u8; 8];
    OsRng.try_fill_bytes(&mut buf).expect("os rng available");
    hex::encode(buf)
}

/// Logs `request.start` / `request.end` with method, sanitized path, status, and latency, and
/// stamps the response with `X-Request-ID`.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let request_id = random_request_id();
    let method = req.method().clone();
    let path = sanitize_path(req.uri().path());

    tracing::info!(request_id = %request_id, method = %method, path = %path, "request.start");

    let start = Instant::now();
    let mut response = next.run(req).await;
    let latency_ms = start.elapsed().as_millis();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms,
        "request.end"
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
