use crate::{AppState, handlers};
use axum::{
    Router,
    routing::get,
};

/// Public Router Module
///
/// Endpoints reachable without a session. `/login` itself decides whether an already
/// authenticated visitor should be sent on to the dashboard.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "OK" }))
        // GET/POST /login
        .route(
            "/login",
            get(handlers::login_page).post(handlers::login_submit),
        )
        // GET /logout
        // Destroys the session; safe to call without one.
        .route("/logout", get(handlers::logout))
        .route("/", get(handlers::root))
}
