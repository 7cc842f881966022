//! Caller-identity key functions used to key the rate limiter (spec.md §4.8).
//!
//! Each extractor returns an owned `String` key or `None` when the request carries no
//! identifying information for that strategy — callers treat `None` as "skip rate limiting for
//! this request" rather than falling back to a wildcard key, so one misbehaving caller can never
//! be bucketed together with every other unidentifiable one.

use crate::claims::UserClaims;
use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Key by the connecting socket address, honoring `X-Forwarded-For`'s first hop when present.
///
/// Trusting the leftmost `X-Forwarded-For` entry assumes a trusted reverse proxy sits in front
/// of this service and appends rather than rewrites the header; this is the deployment topology
/// the gateway is built for, not a general-purpose proxy chain.
#[must_use]
pub fn client_ip(headers: &HeaderMap, remote: SocketAddr) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let first = forwarded.split(',').next().map(str::trim);
        if let Some(ip) = first.filter(|s| !s.is_empty()) {
            return Some(ip.to_string());
        }
    }
    Some(remote.ip().to_string())
}

/// Key by the opaque session cookie value, falling back to [`client_ip`] when no session is
/// present (spec.md §4.8).
#[must_use]
pub fn session(session_id: Option<&str>, headers: &HeaderMap, remote: SocketAddr) -> Option<String> {
    session_id
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| client_ip(headers, remote))
}

/// Key by `user_id` when authenticated, otherwise by IP — so a rate limit shared across an
/// authenticated and anonymous path never conflates two different callers.
#[must_use]
pub fn user_or_ip(claims: Option<&UserClaims>, headers: &HeaderMap, remote: SocketAddr) -> Option<String> {
    if let Some(claims) = claims {
        if !claims.user_id.is_empty() {
            return Some(format!("user:{}", claims.user_id));
        }
    }
    client_ip(headers, remote).map(|ip| format!("ip:{ip}"))
}
