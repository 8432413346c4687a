use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use tower_sessions::{
    Expiry, MemoryStore, SessionManagerLayer,
    cookie::{SameSite, time::Duration},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Domain vocabulary: modules, actions and the permission snapshot.
pub mod catalog;
pub mod models;
pub mod permissions;

// Request pipeline: session identity, gates, terminal outcomes.
pub mod auth;
pub mod gate;
pub mod handlers;
pub mod outcome;

// Services behind trait seams.
pub mod lookup;
pub mod repository;

pub mod config;
pub mod error;
pub mod seed;

// Route groups (Public, Authenticated, Modules).
pub mod routes;
use routes::{authenticated, modules, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use lookup::{HttpCaLookup, LookupState, MockCaLookup};
pub use outcome::Views;
pub use repository::{MockRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints: the `salvar` form submissions and the CA
/// lookup. HTML pages are not described. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::save_unit, handlers::save_client, handlers::save_service,
        handlers::save_service_order, handlers::save_ppe_item, handlers::save_risk,
        handlers::save_user, handlers::save_profile, handlers::lookup_ca
    ),
    components(
        schemas(
            models::NewUnit, models::NewClient, models::NewService, models::NewServiceOrder,
            models::NewPpeItem, models::NewRisk, models::NewUser, models::NewProfile,
            models::JsonReply, models::CaValidity, permissions::Capabilities,
            permissions::Action,
        )
    ),
    tags(
        (name = "raven-admin", description = "Raven Admin back office")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared state of every request. Services sit behind trait objects so tests can swap
/// in `MockRepository` and `MockCaLookup`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub lookup: LookupState,
    /// Template environment used by the `render_views` layer.
    pub views: Views,
    /// Server-side session records. Cloning shares the same store.
    pub sessions: MemoryStore,
    pub config: AppConfig,
}

impl AppState {
    /// Bundles the services with a fresh template environment and an empty session store.
    pub fn new(repo: RepositoryState, lookup: LookupState, config: AppConfig) -> Self {
        Self {
            repo,
            lookup,
            views: Views::new(),
            sessions: MemoryStore::default(),
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for LookupState {
    fn from_ref(app_state: &AppState) -> LookupState {
        app_state.lookup.clone()
    }
}

impl FromRef<AppState> for Views {
    fn from_ref(app_state: &AppState) -> Views {
        app_state.views.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Composes the route groups, each route carrying its own gate chain, and wraps them in
/// the view renderer, the session manager and the observability stack.
pub fn create_router(state: AppState) -> Router {
    let x_request_id = HeaderName::from_static("x-request-id");

    let sessions = SessionManagerLayer::new(state.sessions.clone())
        .with_name(auth::SESSION_COOKIE)
        .with_http_only(true)
        .with_same_site(SameSite::Lax)
        .with_secure(state.config.is_production())
        .with_expiry(Expiry::OnInactivity(Duration::minutes(
            state.config.session_max_age_minutes,
        )))
        .with_signed(auth::signing_key(&state.config.session_secret));

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(modules::module_routes())
        .fallback(handlers::not_found)
        // Innermost: turns `Outcome::Render` markers into HTML.
        .layer(middleware::from_fn_with_state(
            state.views.clone(),
            outcome::render_views,
        ))
        .layer(sessions)
        .with_state(state);

    base_router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Span for one request, carrying the `x-request-id` so every log line of the request can
/// be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
