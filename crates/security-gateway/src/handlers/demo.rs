//! Stand-ins for the real capacity-planning handlers (out of scope per spec.md §1); these exist
//! only so the middleware chain has routes to protect and the end-to-end scenarios in spec.md
//! §8 have something literal to call.

use axum::Json;
use serde_json::{Value, json};

/// A cookie-authenticated, CSRF-protected write endpoint.
pub async fn scenario_compare() -> Json<Value> {
    Json(json!({ "status": "accepted" }))
}

/// An operator-gated write endpoint.
pub async fn infrastructure_manual() -> Json<Value> {
    Json(json!({ "status": "accepted" }))
}
