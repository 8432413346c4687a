use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use minijinja::context;
use raven_admin::{
    AppConfig, AppState, MockCaLookup, MockRepository,
    auth::{self, CurrentUser, SessionUser},
    catalog::Module,
    handlers,
    lookup::LookupState,
    models::{NewServiceOrder, NewUnit, NewUser},
    outcome::{FormJson, Outcome, PendingView, Views},
    permissions::{Action, Capabilities, PermissionMap},
    repository::{Repository, RepositoryState},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::test;

// --- Test Scaffolding ---

fn state_with(repo: Arc<MockRepository>, lookup: MockCaLookup) -> AppState {
    AppState::new(
        repo as RepositoryState,
        Arc::new(lookup) as LookupState,
        AppConfig::default(),
    )
}

fn administrator(user_id: i64) -> CurrentUser {
    CurrentUser {
        user: SessionUser {
            id: user_id,
            name: "Administrador".to_string(),
            email: "admin@raven.local".to_string(),
        },
        permissions: Module::ALL
            .into_iter()
            .map(|m| (m.key(), Capabilities::full()))
            .collect(),
    }
}

async fn json_of(outcome: Outcome) -> (StatusCode, Value) {
    let response = outcome.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// --- Form Submissions ---

#[test]
async fn test_save_unit_records_creation_activity() {
    let repo = Arc::new(MockRepository::new());
    let state = state_with(repo.clone(), MockCaLookup::new());

    let outcome = handlers::save_unit(
        administrator(1),
        State(state),
        FormJson(NewUnit {
            nome: "  Filial Norte ".to_string(),
            cidade: Some(String::new()),
        }),
    )
    .await;

    let (status, reply) = json_of(outcome).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["success"], json!(true));

    let units = repo.list_units().await.unwrap();
    assert_eq!(units[0].nome, "Filial Norte");
    assert_eq!(units[0].cidade, None);

    let activity = repo.activity();
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].acao, "criar");
    assert!(activity[0].detalhe.as_deref().unwrap().starts_with("unidades #"));
}

#[test]
async fn test_save_user_stores_a_verifiable_hash() {
    let repo = Arc::new(MockRepository::new());
    let profile_id = repo.seed_profile("Técnico", &[(Module::Risks, Capabilities::only(&[Action::View]))]);
    let state = state_with(repo.clone(), MockCaLookup::new());

    let outcome = handlers::save_user(
        administrator(1),
        State(state),
        FormJson(NewUser {
            nome: "Bruno".to_string(),
            email: "Bruno@Raven.local".to_string(),
            senha: "senha-forte".to_string(),
            perfil_id: profile_id,
            unidade_id: None,
        }),
    )
    .await;
    let (status, _) = json_of(outcome).await;
    assert_eq!(status, StatusCode::OK);

    let stored = repo
        .find_credentials("bruno@raven.local")
        .await
        .unwrap()
        .expect("email is stored lowercased");
    assert_ne!(stored.senha_hash, "senha-forte");
    assert!(auth::verify_password("senha-forte", &stored.senha_hash));
    assert!(!auth::verify_password("outra", &stored.senha_hash));
}

#[test]
async fn test_save_user_with_duplicate_email_conflicts() {
    let repo = Arc::new(MockRepository::new());
    let profile_id = repo.seed_profile("Técnico", &[]);
    repo.seed_user("Ana", "ana@raven.local", "hash", Some(profile_id));
    let state = state_with(repo.clone(), MockCaLookup::new());

    let outcome = handlers::save_user(
        administrator(1),
        State(state),
        FormJson(NewUser {
            nome: "Ana Maria".to_string(),
            email: "ana@raven.local".to_string(),
            senha: "123456".to_string(),
            perfil_id: profile_id,
            unidade_id: None,
        }),
    )
    .await;

    let (status, reply) = json_of(outcome).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(reply["message"], json!("Registro já existe."));
    assert!(repo.activity().is_empty());
}

#[test]
async fn test_service_order_for_unknown_client_is_rejected() {
    let repo = Arc::new(MockRepository::new());
    let state = state_with(repo.clone(), MockCaLookup::new());

    let outcome = handlers::save_service_order(
        administrator(1),
        State(state),
        FormJson(NewServiceOrder {
            cliente_id: 404,
            servico_id: 404,
            data_abertura: None,
            observacoes: None,
        }),
    )
    .await;

    let (status, reply) = json_of(outcome).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(reply["success"], json!(false));
}

#[test]
async fn test_save_with_database_down_is_a_server_error() {
    let repo = Arc::new(MockRepository::unavailable());
    let state = state_with(repo, MockCaLookup::new());

    let outcome = handlers::save_unit(
        administrator(1),
        State(state),
        FormJson(NewUnit {
            nome: "Matriz".to_string(),
            cidade: None,
        }),
    )
    .await;

    let (status, reply) = json_of(outcome).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply["message"], json!("Erro ao salvar o registro."));
}

// --- Pages ---

#[test]
async fn test_dashboard_names_its_view() {
    let repo = Arc::new(MockRepository::new());
    let state = state_with(repo, MockCaLookup::new());

    match handlers::dashboard(administrator(1), State(state)).await {
        Ok(Outcome::Render { view, .. }) => assert_eq!(view, "dashboard.html"),
        other => panic!("expected a rendered view, got {:?}", other.map(|_| ())),
    }
}

#[test]
async fn test_page_with_database_down_is_a_500_page() {
    let repo = Arc::new(MockRepository::unavailable());
    let state = state_with(repo, MockCaLookup::new());

    let response = handlers::list_units(administrator(1), State(state))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
async fn test_unknown_view_is_not_found() {
    let views = Views::new();
    let response = views.respond(&PendingView {
        view: "missing.html".to_string(),
        context: context! {},
    });
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
async fn test_list_view_renders_rows() {
    let views = Views::new();
    let current = CurrentUser {
        permissions: PermissionMap::new(),
        ..administrator(1)
    };
    let response = views.respond(&PendingView {
        view: "module/list.html".to_string(),
        context: context! {
            user => &current.user,
            menu => Module::menu(&current.permissions),
            module => context! { key => "riscos", title => "Riscos", path => "/riscos", can_create => false },
            columns => Module::Risks.columns(),
            rows => vec![json!({ "id": 1, "descricao": "Ruído", "categoria": "físico", "severidade": "alta" })],
        },
    });

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("Ruído"));
    assert!(page.contains("<td>alta</td>"));
}

// --- CA Lookup ---

#[test]
async fn test_lookup_upstream_failure_is_a_server_error() {
    let state = state_with(Arc::new(MockRepository::new()), MockCaLookup::failing());

    let (status, body) = json_of(handlers::lookup_ca(State(state), Path("12345".to_string())).await).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[test]
async fn test_lookup_found_returns_validity() {
    let state = state_with(
        Arc::new(MockRepository::new()),
        MockCaLookup::with("4567", "15/08/2027"),
    );

    let (status, body) =
        json_of(handlers::lookup_ca(State(state), Path("CA 45-67".to_string())).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "validade": "15/08/2027" }));
}
