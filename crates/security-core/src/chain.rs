//! Composes middleware onto a [`Router`] in declared order (spec.md §4.1).
//!
//! `axum::Router::layer` makes each call's layer the new outermost wrapper, so composing
//! `m1, m2, …, mN` by calling `.layer(m1).layer(m2)…` would run `mN` first — the reverse of
//! `Chain(h, m1, …, mN) = m1(m2(…mN(h)))`. [`chain`] applies the list in reverse so the call
//! site still reads top-to-bottom in execution order.

use axum::Router;

/// One layer application, deferred so [`chain`] can apply them in the right order.
pub type Layer = Box<dyn FnOnce(Router) -> Router>;

/// Apply `layers` to `router` so the first entry ends up outermost (runs first on the way in,
/// last on the way out).
#[must_use]
pub fn chain(router: Router, layers: Vec<Layer>) -> Router {
    layers.into_iter().rev().fold(router, |r, apply| apply(r))
}
