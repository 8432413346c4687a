use super::gated;
use crate::{AppState, gate::GateChain, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes open to any logged-in user regardless of the permission snapshot.
pub fn authenticated_routes() -> Router<AppState> {
    Router::new()
        // GET /dashboard
        // Landing page and the target of every permission denial.
        .route(
            "/dashboard",
            gated(GateChain::authenticated(), get(handlers::dashboard)),
        )
        // GET /api/epi/ca/{code}
        // Proxies the Certificate of Approval lookup used by the PPE form.
        .route(
            "/api/epi/ca/{code}",
            gated(GateChain::authenticated(), get(handlers::lookup_ca)),
        )
}
