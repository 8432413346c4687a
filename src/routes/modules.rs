use super::gated;
use crate::{
    AppState,
    catalog::Module,
    gate::GateChain,
    handlers,
    permissions::Action,
};
use axum::{
    Router,
    routing::{MethodRouter, get, post},
};

/// Module Router
///
/// Every catalogue module exposes the same three routes:
///
/// - `GET  /{key}`        list page, needs `view`
/// - `GET  /{key}/novo`   creation form, needs `create`
/// - `POST /{key}/salvar` JSON submission, needs `create`
pub fn module_routes() -> Router<AppState> {
    Router::new()
        .merge(crud(
            Module::Units,
            get(handlers::list_units),
            get(handlers::new_unit),
            post(handlers::save_unit),
        ))
        .merge(crud(
            Module::Clients,
            get(handlers::list_clients),
            get(handlers::new_client),
            post(handlers::save_client),
        ))
        .merge(crud(
            Module::Services,
            get(handlers::list_services),
            get(handlers::new_service),
            post(handlers::save_service),
        ))
        .merge(crud(
            Module::ServiceOrders,
            get(handlers::list_service_orders),
            get(handlers::new_service_order),
            post(handlers::save_service_order),
        ))
        .merge(crud(
            Module::Ppe,
            get(handlers::list_ppe_items),
            get(handlers::new_ppe_item),
            post(handlers::save_ppe_item),
        ))
        .merge(crud(
            Module::Risks,
            get(handlers::list_risks),
            get(handlers::new_risk),
            post(handlers::save_risk),
        ))
        .merge(crud(
            Module::Users,
            get(handlers::list_users),
            get(handlers::new_user),
            post(handlers::save_user),
        ))
        .merge(crud(
            Module::Profiles,
            get(handlers::list_profiles),
            get(handlers::new_profile),
            post(handlers::save_profile),
        ))
}

fn crud(
    module: Module,
    list: MethodRouter<AppState>,
    form: MethodRouter<AppState>,
    save: MethodRouter<AppState>,
) -> Router<AppState> {
    let path = module.path();
    Router::new()
        .route(&path, gated(GateChain::permission(module, Action::View), list))
        .route(
            &format!("{path}/novo"),
            gated(GateChain::permission(module, Action::Create), form),
        )
        .route(
            &format!("{path}/salvar"),
            gated(GateChain::permission(module, Action::Create), save),
        )
}
