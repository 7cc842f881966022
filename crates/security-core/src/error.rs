//! Error kinds surfaced to HTTP clients as `{error, code?}` JSON bodies (spec.md §7).

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The five error kinds the core can raise, each mapped to one HTTP status.
///
/// Middleware and handlers return `Result<_, CoreError>` so the response body shape is produced
/// in exactly one place (`IntoResponse` below) instead of being assembled ad hoc at each call
/// site.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    Authentication(&'static str),

    #[error("{0}")]
    Authorization(&'static str),

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0}")]
    BadInput(&'static str),

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            CoreError::Authentication(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: msg.to_string(),
                    code: Some(401),
                    retry_after: None,
                },
            ),
            CoreError::Authorization(msg) => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    error: msg.to_string(),
                    code: Some(403),
                    retry_after: None,
                },
            ),
            CoreError::RateLimited { retry_after_secs } => {
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [("Retry-After", retry_after_secs.to_string())],
                    Json(ErrorBody {
                        error: "Rate limit exceeded".to_string(),
                        code: Some(429),
                        retry_after: Some(retry_after_secs),
                    }),
                )
                    .into_response();
            }
            CoreError::BadInput(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: msg.to_string(),
                    code: Some(400),
                    retry_after: None,
                },
            ),
            CoreError::Upstream(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorBody {
                    error: msg,
                    code: Some(502),
                    retry_after: None,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}
