//! Identity carried on the request after authentication (spec.md §3 "UserClaims").

use serde::{Deserialize, Serialize};

/// A role in the (currently two-level) hierarchy.
///
/// Unknown scope strings never elevate a caller above `Viewer`; see [`Role::from_scopes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Operator,
}

impl Role {
    /// Numeric level used by the RBAC gate. Anything not representable as a `Role` is level 0
    /// (fail-closed), which `Role` itself can never be since it has no "unknown" variant.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Role::Viewer => 1,
            Role::Operator => 2,
        }
    }

    /// Derive a role from a UAA `scope` list: `diego-analyzer.operator` elevates to
    /// `Operator`, anything else (including no diego-analyzer scope at all) stays `Viewer`.
    #[must_use]
    pub fn from_scopes<'a>(scopes: impl IntoIterator<Item = &'a str>) -> Role {
        for scope in scopes {
            if scope == "diego-analyzer.operator" {
                return Role::Operator;
            }
        }
        Role::Viewer
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Viewer
    }
}

/// Identity resolved by the auth middleware and attached to the request's extensions.
///
/// Immutable once attached; read by RBAC and the rate-limit key extractors, discarded with the
/// request. Never carries a token.
#[derive(Debug, Clone, Default)]
pub struct UserClaims {
    /// May be empty for client-credential tokens.
    pub username: String,
    pub user_id: String,
    pub role: Role,
}

impl UserClaims {
    #[must_use]
    pub fn new(username: impl Into<String>, user_id: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            user_id: user_id.into(),
            role,
        }
    }

    /// Anonymous callers are treated as `Viewer` for RBAC purposes (spec.md §4.5).
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            username: String::new(),
            user_id: String::new(),
            role: Role::Viewer,
        }
    }
}
