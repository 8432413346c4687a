//! Router Module Index
//!
//! Routes are grouped by the gate chain they carry. Gates are attached per route with
//! `route_layer`, so an unknown path never reaches a gate and falls through to the 404
//! fallback.

use crate::{
    AppState,
    gate::{self, GateChain},
};
use axum::{middleware, routing::MethodRouter};

/// No gates: health, login, logout and the root redirect.
pub mod public;

/// Authentication Gate only: dashboard and the CA lookup.
pub mod authenticated;

/// Authentication Gate followed by a Permission Gate on (module, action).
pub mod modules;

/// Wraps a method router so that `chain` runs, in order, before the handler.
pub fn gated(chain: GateChain, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(chain, gate::enforce))
}
