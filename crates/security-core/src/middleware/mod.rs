//! The middleware pipeline: `Request Log -> CORS -> Rate Limit -> Authentication -> Role Gate ->
//! CSRF -> Handler` (spec.md §2). Each layer here is one segment of that chain; `crate::chain`
//! composes them onto a [`axum::Router`] in order.

pub mod auth;
pub mod cors;
pub mod csrf;
pub mod logging;
pub mod rate_limit;
pub mod rbac;

pub use auth::{AuthMode, AuthState, authenticate};
pub use cors::{CorsState, apply_cors};
pub use csrf::verify_csrf;
pub use logging::log_requests;
pub use rate_limit::{RateLimitState, enforce_rate_limit};
pub use rbac::{RoleGate, require_role};
