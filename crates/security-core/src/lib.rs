//! Security and request-control core for the Diego capacity-planning API: authentication, RBAC,
//! CSRF, CORS, rate limiting, request logging, and the BFF session/login flow.
//!
//! This crate owns every component in the middleware chain except the HTTP process itself —
//! no `tokio::main`, no config loading, no bound listener. `diego-security-gateway` wires these
//! pieces into an axum server.

pub mod chain;
pub mod claims;
pub mod error;
pub mod jwks;
pub mod key_extractors;
pub mod middleware;
pub mod rate_limit;
pub mod session;
pub mod ttl_cache;

pub use chain::chain;
pub use claims::{Role, UserClaims};
pub use error::CoreError;
pub use jwks::{JwksClient, JwksError};
pub use rate_limit::RateLimiter;
pub use session::{CSRF_COOKIE, CSRF_HEADER, SESSION_COOKIE, LoginOutcome, Session, SessionError, SessionService};
pub use ttl_cache::TtlCache;
