use crate::{
    AppState,
    auth::{self, CurrentUser, MESSAGE_KEY, SessionContext, SessionUser},
    catalog::Module,
    error::{AppError, not_found_page},
    gate::{DASHBOARD_PATH, LOGIN_PATH},
    lookup::{LookupError, normalize_ca_code},
    models::{
        CaValidity, JsonReply, NewActivity, NewClient, NewPpeItem, NewProfile, NewRisk,
        NewService, NewServiceOrder, NewUnit, NewUser, PPE_KINDS, RISK_CATEGORIES,
        RISK_SEVERITIES,
    },
    outcome::{FormJson, Outcome},
    permissions::{Action, PermissionMap},
    repository::{RepoResult, Repository},
};
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
};
use minijinja::context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tower_sessions::Session;

/// Number of activity-log entries shown on the dashboard.
pub const RECENT_ACTIVITY_LIMIT: i64 = 10;

const INVALID_CREDENTIALS: &str = "E-mail ou senha inválidos.";

// --- Form Payloads & View Models ---

/// LoginForm
///
/// Body of `POST /login`. Missing fields count as a credential mismatch.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
}

#[derive(Debug, Serialize)]
struct ModuleView {
    key: &'static str,
    title: &'static str,
    path: String,
    can_create: bool,
}

impl ModuleView {
    fn new(module: Module, permissions: &PermissionMap) -> Self {
        Self {
            key: module.key(),
            title: module.title(),
            path: module.path(),
            can_create: permissions.allows(module.key(), Action::Create),
        }
    }
}

#[derive(Debug, Serialize)]
struct SelectOption {
    value: String,
    label: String,
}

impl SelectOption {
    fn new(value: impl ToString, label: impl Into<String>) -> Self {
        Self {
            value: value.to_string(),
            label: label.into(),
        }
    }

    fn fixed(values: &[&str]) -> Vec<Self> {
        values.iter().map(|v| Self::new(v, *v)).collect()
    }
}

type SelectOptions = BTreeMap<&'static str, Vec<SelectOption>>;

fn list_page<T: Serialize>(current: &CurrentUser, module: Module, rows: &[T]) -> Outcome {
    Outcome::render(
        "module/list.html",
        context! {
            user => &current.user,
            menu => Module::menu(&current.permissions),
            module => ModuleView::new(module, &current.permissions),
            columns => module.columns(),
            rows => rows,
        },
    )
}

fn form_page(current: &CurrentUser, module: Module, options: SelectOptions) -> Outcome {
    Outcome::render(
        "module/form.html",
        context! {
            user => &current.user,
            menu => Module::menu(&current.permissions),
            module => ModuleView::new(module, &current.permissions),
            fields => module.fields(),
            options => options,
        },
    )
}

/// Appends an activity-log row. The write is awaited; a failure is logged and does not
/// change the response.
async fn record(repo: &dyn Repository, user_id: Option<i64>, acao: &str, detalhe: String) {
    if let Err(e) = repo
        .record_activity(NewActivity::new(user_id, acao, detalhe))
        .await
    {
        tracing::warn!(acao, "failed to record activity: {}", e);
    }
}

/// Shared tail of every `salvar` handler.
async fn finish_save(
    repo: &dyn Repository,
    current: &CurrentUser,
    module: Module,
    result: RepoResult<i64>,
    message: &str,
) -> Outcome {
    match result {
        Ok(id) => {
            tracing::info!(user_id = current.user.id, module = %module, id, "record created");
            record(repo, Some(current.user.id), "criar", format!("{} #{}", module, id)).await;
            Outcome::saved(message, id)
        }
        Err(e) => Outcome::save_failed(e),
    }
}

// --- Session Handlers ---

/// GET /
pub async fn root() -> Outcome {
    Outcome::Redirect(DASHBOARD_PATH)
}

/// login_page
///
/// [Public Route] Shows the login form together with the pending flash message, which is
/// consumed. An already authenticated session goes straight to the dashboard.
pub async fn login_page(session: Session) -> Result<Outcome, AppError> {
    if SessionContext::load(&session).await.user.is_some() {
        return Ok(Outcome::Redirect(DASHBOARD_PATH));
    }
    let message = session.remove::<String>(MESSAGE_KEY).await?;
    Ok(Outcome::render("login.html", context! { message => message }))
}

/// login_submit
///
/// [Public Route] Verifies the e-mail/password pair against the stored Argon2 hash. On
/// success the identity and the profile's permission snapshot are written to a fresh
/// session. On any mismatch only the flash message is written.
pub async fn login_submit(
    session: Session,
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Outcome, AppError> {
    let email = form.email.trim().to_lowercase();

    let account = match state.repo.find_credentials(&email).await? {
        Some(c) if c.ativo && auth::verify_password(&form.senha, &c.senha_hash) => c,
        _ => {
            tracing::warn!(email = %email, "login rejected");
            session.insert(MESSAGE_KEY, INVALID_CREDENTIALS).await?;
            return Ok(Outcome::Redirect(LOGIN_PATH));
        }
    };

    let permissions = match account.perfil_id {
        Some(profile_id) => state.repo.load_permissions(profile_id).await?,
        None => PermissionMap::new(),
    };

    let user = SessionUser {
        id: account.id,
        name: account.nome,
        email: account.email,
    };
    auth::establish(&session, &user, &permissions).await?;

    tracing::info!(user_id = user.id, modules = permissions.len(), "login succeeded");
    record(state.repo.as_ref(), Some(user.id), "login", user.email.clone()).await;

    Ok(Outcome::Redirect(DASHBOARD_PATH))
}

/// logout
///
/// [Public Route] Destroys the whole session; any later gated request goes to `/login`.
pub async fn logout(session: Session, State(state): State<AppState>) -> Result<Outcome, AppError> {
    if let Some(user) = SessionContext::load(&session).await.user {
        record(state.repo.as_ref(), Some(user.id), "logout", user.email).await;
    }
    session.flush().await?;
    Ok(Outcome::Redirect(LOGIN_PATH))
}

/// dashboard
///
/// [Authenticated Route] Counters, the latest activity and the modules this session may
/// open.
pub async fn dashboard(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let stats = state.repo.dashboard_stats().await?;
    let activity = state.repo.recent_activity(RECENT_ACTIVITY_LIMIT).await?;

    Ok(Outcome::render(
        "dashboard.html",
        context! {
            user => &current.user,
            menu => Module::menu(&current.permissions),
            stats => stats,
            activity => activity,
        },
    ))
}

/// Fallback for unknown paths.
pub async fn not_found() -> Response {
    not_found_page()
}

// --- Units ---

pub async fn list_units(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let rows = state.repo.list_units().await?;
    Ok(list_page(&current, Module::Units, &rows))
}

pub async fn new_unit(current: CurrentUser) -> Outcome {
    form_page(&current, Module::Units, SelectOptions::new())
}

#[utoipa::path(
    post,
    path = "/unidades/salvar",
    request_body = NewUnit,
    responses(
        (status = 200, description = "Saved", body = JsonReply),
        (status = 400, description = "Invalid payload", body = JsonReply),
        (status = 409, description = "Duplicate", body = JsonReply)
    )
)]
pub async fn save_unit(
    current: CurrentUser,
    State(state): State<AppState>,
    FormJson(unit): FormJson<NewUnit>,
) -> Outcome {
    let result = state.repo.create_unit(unit).await;
    finish_save(state.repo.as_ref(), &current, Module::Units, result, "Unidade cadastrada com sucesso.").await
}

// --- Clients ---

pub async fn list_clients(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let rows = state.repo.list_clients().await?;
    Ok(list_page(&current, Module::Clients, &rows))
}

pub async fn new_client(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let units = state.repo.list_units().await?;
    let mut options = SelectOptions::new();
    options.insert(
        "unidade_id",
        units.into_iter().map(|u| SelectOption::new(u.id, u.nome)).collect(),
    );
    Ok(form_page(&current, Module::Clients, options))
}

#[utoipa::path(
    post,
    path = "/clientes/salvar",
    request_body = NewClient,
    responses(
        (status = 200, description = "Saved", body = JsonReply),
        (status = 400, description = "Invalid payload", body = JsonReply),
        (status = 409, description = "Duplicate CNPJ", body = JsonReply)
    )
)]
pub async fn save_client(
    current: CurrentUser,
    State(state): State<AppState>,
    FormJson(client): FormJson<NewClient>,
) -> Outcome {
    let result = state.repo.create_client(client).await;
    finish_save(state.repo.as_ref(), &current, Module::Clients, result, "Cliente cadastrado com sucesso.").await
}

// --- Services ---

pub async fn list_services(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let rows = state.repo.list_services().await?;
    Ok(list_page(&current, Module::Services, &rows))
}

pub async fn new_service(current: CurrentUser) -> Outcome {
    form_page(&current, Module::Services, SelectOptions::new())
}

#[utoipa::path(
    post,
    path = "/servicos/salvar",
    request_body = NewService,
    responses(
        (status = 200, description = "Saved", body = JsonReply),
        (status = 400, description = "Invalid payload", body = JsonReply),
        (status = 409, description = "Duplicate", body = JsonReply)
    )
)]
pub async fn save_service(
    current: CurrentUser,
    State(state): State<AppState>,
    FormJson(service): FormJson<NewService>,
) -> Outcome {
    let result = state.repo.create_service(service).await;
    finish_save(state.repo.as_ref(), &current, Module::Services, result, "Serviço cadastrado com sucesso.").await
}

// --- Service Orders ---

pub async fn list_service_orders(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let rows = state.repo.list_service_orders().await?;
    Ok(list_page(&current, Module::ServiceOrders, &rows))
}

pub async fn new_service_order(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let clients = state.repo.list_clients().await?;
    let services = state.repo.list_services().await?;
    let mut options = SelectOptions::new();
    options.insert(
        "cliente_id",
        clients.into_iter().map(|c| SelectOption::new(c.id, c.razao_social)).collect(),
    );
    options.insert(
        "servico_id",
        services.into_iter().map(|s| SelectOption::new(s.id, s.nome)).collect(),
    );
    Ok(form_page(&current, Module::ServiceOrders, options))
}

#[utoipa::path(
    post,
    path = "/ordens-servico/salvar",
    request_body = NewServiceOrder,
    responses(
        (status = 200, description = "Saved", body = JsonReply),
        (status = 400, description = "Invalid payload or unknown client/service", body = JsonReply)
    )
)]
pub async fn save_service_order(
    current: CurrentUser,
    State(state): State<AppState>,
    FormJson(order): FormJson<NewServiceOrder>,
) -> Outcome {
    let result = state.repo.create_service_order(order).await;
    finish_save(state.repo.as_ref(), &current, Module::ServiceOrders, result, "Ordem de serviço aberta com sucesso.").await
}

// --- PPE / PPC Inventory ---

pub async fn list_ppe_items(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let rows = state.repo.list_ppe_items().await?;
    Ok(list_page(&current, Module::Ppe, &rows))
}

pub async fn new_ppe_item(current: CurrentUser) -> Outcome {
    let mut options = SelectOptions::new();
    options.insert("tipo", SelectOption::fixed(&PPE_KINDS));
    form_page(&current, Module::Ppe, options)
}

#[utoipa::path(
    post,
    path = "/epi/salvar",
    request_body = NewPpeItem,
    responses(
        (status = 200, description = "Saved", body = JsonReply),
        (status = 400, description = "Invalid payload", body = JsonReply)
    )
)]
pub async fn save_ppe_item(
    current: CurrentUser,
    State(state): State<AppState>,
    FormJson(item): FormJson<NewPpeItem>,
) -> Outcome {
    let result = state.repo.create_ppe_item(item).await;
    finish_save(state.repo.as_ref(), &current, Module::Ppe, result, "Equipamento cadastrado com sucesso.").await
}

// --- Risks ---

pub async fn list_risks(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let rows = state.repo.list_risks().await?;
    Ok(list_page(&current, Module::Risks, &rows))
}

pub async fn new_risk(current: CurrentUser) -> Outcome {
    let mut options = SelectOptions::new();
    options.insert("categoria", SelectOption::fixed(&RISK_CATEGORIES));
    options.insert("severidade", SelectOption::fixed(&RISK_SEVERITIES));
    form_page(&current, Module::Risks, options)
}

#[utoipa::path(
    post,
    path = "/riscos/salvar",
    request_body = NewRisk,
    responses(
        (status = 200, description = "Saved", body = JsonReply),
        (status = 400, description = "Invalid payload", body = JsonReply)
    )
)]
pub async fn save_risk(
    current: CurrentUser,
    State(state): State<AppState>,
    FormJson(risk): FormJson<NewRisk>,
) -> Outcome {
    let result = state.repo.create_risk(risk).await;
    finish_save(state.repo.as_ref(), &current, Module::Risks, result, "Risco cadastrado com sucesso.").await
}

// --- Users ---

pub async fn list_users(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let rows = state.repo.list_users().await?;
    Ok(list_page(&current, Module::Users, &rows))
}

pub async fn new_user(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let profiles = state.repo.list_profiles().await?;
    let units = state.repo.list_units().await?;
    let mut options = SelectOptions::new();
    options.insert(
        "perfil_id",
        profiles.into_iter().map(|p| SelectOption::new(p.id, p.nome)).collect(),
    );
    options.insert(
        "unidade_id",
        units.into_iter().map(|u| SelectOption::new(u.id, u.nome)).collect(),
    );
    Ok(form_page(&current, Module::Users, options))
}

/// save_user
///
/// The password is hashed here; the repository only ever sees the PHC string.
#[utoipa::path(
    post,
    path = "/usuarios/salvar",
    request_body = NewUser,
    responses(
        (status = 200, description = "Saved", body = JsonReply),
        (status = 400, description = "Invalid payload", body = JsonReply),
        (status = 409, description = "E-mail already registered", body = JsonReply)
    )
)]
pub async fn save_user(
    current: CurrentUser,
    State(state): State<AppState>,
    FormJson(mut user): FormJson<NewUser>,
) -> Outcome {
    let password_hash = match auth::hash_password(&user.senha) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("failed to hash password: {}", e);
            return Outcome::failed(StatusCode::INTERNAL_SERVER_ERROR, "Erro ao salvar o registro.");
        }
    };
    user.senha.clear();

    let result = state.repo.create_user(user, password_hash).await;
    finish_save(state.repo.as_ref(), &current, Module::Users, result, "Usuário cadastrado com sucesso.").await
}

// --- Profiles ---

pub async fn list_profiles(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let rows = state.repo.list_profiles().await?;
    Ok(list_page(&current, Module::Profiles, &rows))
}

/// new_profile
///
/// The profile form adds a permission matrix: one row per module, one checkbox per action.
pub async fn new_profile(current: CurrentUser, State(state): State<AppState>) -> Result<Outcome, AppError> {
    let modules = state.repo.list_modules().await?;
    let actions: Vec<_> = Action::EVERY
        .into_iter()
        .map(|a| context! { key => a.as_str(), label => a.label() })
        .collect();

    Ok(Outcome::render(
        "module/form.html",
        context! {
            user => &current.user,
            menu => Module::menu(&current.permissions),
            module => ModuleView::new(Module::Profiles, &current.permissions),
            fields => Module::Profiles.fields(),
            options => SelectOptions::new(),
            matrix => context! { modules => modules, actions => actions },
        },
    ))
}

/// save_profile
///
/// Stores the profile and its permission rows in one transaction. Any failure (blank
/// name, unknown module, duplicate name) leaves no rows behind.
#[utoipa::path(
    post,
    path = "/perfis/salvar",
    request_body = NewProfile,
    responses(
        (status = 200, description = "Profile and permissions stored", body = JsonReply),
        (status = 400, description = "Rolled back: invalid payload", body = JsonReply),
        (status = 409, description = "Rolled back: duplicate name", body = JsonReply)
    )
)]
pub async fn save_profile(
    current: CurrentUser,
    State(state): State<AppState>,
    FormJson(profile): FormJson<NewProfile>,
) -> Outcome {
    let result = state.repo.create_profile(profile).await;
    finish_save(state.repo.as_ref(), &current, Module::Profiles, result, "Perfil cadastrado com sucesso.").await
}

// --- External Lookup ---

/// lookup_ca
///
/// [Authenticated Route] Validity date of a Certificate of Approval. Non-digit characters
/// are stripped from the code before the upstream call.
#[utoipa::path(
    get,
    path = "/api/epi/ca/{code}",
    params(("code" = String, Path, description = "CA number; non-digits are ignored")),
    responses(
        (status = 200, description = "Validity found", body = CaValidity),
        (status = 404, description = "Unknown certificate"),
        (status = 500, description = "Lookup service unavailable")
    )
)]
pub async fn lookup_ca(State(state): State<AppState>, Path(code): Path<String>) -> Outcome {
    let code = normalize_ca_code(&code);
    if code.is_empty() {
        return Outcome::json(
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "CA não encontrado." }),
        );
    }

    match state.lookup.validity(&code).await {
        Ok(validade) => Outcome::json(StatusCode::OK, CaValidity { validade }),
        Err(LookupError::NotFound) => Outcome::json(
            StatusCode::NOT_FOUND,
            serde_json::json!({ "error": "CA não encontrado." }),
        ),
        Err(LookupError::Unavailable(reason)) => {
            tracing::error!(code = %code, reason = %reason, "CA lookup failed");
            Outcome::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "Serviço de consulta de CA indisponível." }),
            )
        }
    }
}
