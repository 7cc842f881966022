//! Role gate: rejects requests whose resolved role is below a route's required level
//! (spec.md §4.5).

use crate::claims::{Role, UserClaims};
use crate::error::CoreError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Required role for a `require_role`-gated route.
///
/// Constructing one panics if `required` somehow falls outside the hierarchy — the hierarchy is
/// a closed two-variant enum today, so this can't currently happen, but the check stays as the
/// fail-closed guard spec.md §4.5 calls for if the enum ever grows an unvalidated external
/// representation.
#[derive(Clone, Copy)]
pub struct RoleGate {
    required: Role,
}

impl RoleGate {
    #[must_use]
    pub fn new(required: Role) -> Self {
        assert!(required.level() > 0, "required role must be within the hierarchy");
        Self { required }
    }
}

/// Middleware function for [`RoleGate`]; mount with
/// `axum::middleware::from_fn_with_state(gate, require_role)`.
pub async fn require_role(State(gate): State<RoleGate>, req: Request, next: Next) -> Response {
    let role = req
        .extensions()
        .get::<UserClaims>()
        .map_or(Role::Viewer, |c| c.role);

    if role.level() < gate.required.level() {
        return CoreError::Authorization("insufficient role").into_response();
    }
    next.run(req).await
}
