use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    catalog::Module,
    error::RepoError,
    models::{
        ActivityEntry, Client, Credentials, DashboardStats, ModuleInfo, NewActivity, NewClient,
        NewPpeItem, NewProfile, NewRisk, NewService, NewServiceOrder, NewUnit, NewUser,
        ORDER_STATUS_OPEN, PpeItem, Profile, Risk, Service, ServiceOrder, Unit, User,
    },
    permissions::{Capabilities, PermissionMap},
};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The persistence contract used by the handlers. Implemented by `PostgresRepository`
/// and by the in-memory `MockRepository` used in tests and demos.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity & Access ---
    async fn find_credentials(&self, email: &str) -> RepoResult<Option<Credentials>>;
    // Permission snapshot of a profile, keyed by module key.
    async fn load_permissions(&self, profile_id: i64) -> RepoResult<PermissionMap>;
    async fn list_modules(&self) -> RepoResult<Vec<ModuleInfo>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn create_user(&self, user: NewUser, password_hash: String) -> RepoResult<i64>;
    async fn list_profiles(&self) -> RepoResult<Vec<Profile>>;
    // Profile row plus one permission row per module, all-or-nothing.
    async fn create_profile(&self, profile: NewProfile) -> RepoResult<i64>;

    // --- Records ---
    async fn list_units(&self) -> RepoResult<Vec<Unit>>;
    async fn create_unit(&self, unit: NewUnit) -> RepoResult<i64>;
    async fn list_clients(&self) -> RepoResult<Vec<Client>>;
    async fn create_client(&self, client: NewClient) -> RepoResult<i64>;
    async fn list_services(&self) -> RepoResult<Vec<Service>>;
    async fn create_service(&self, service: NewService) -> RepoResult<i64>;
    async fn list_service_orders(&self) -> RepoResult<Vec<ServiceOrder>>;
    async fn create_service_order(&self, order: NewServiceOrder) -> RepoResult<i64>;
    async fn list_ppe_items(&self) -> RepoResult<Vec<PpeItem>>;
    async fn create_ppe_item(&self, item: NewPpeItem) -> RepoResult<i64>;
    async fn list_risks(&self) -> RepoResult<Vec<Risk>>;
    async fn create_risk(&self, risk: NewRisk) -> RepoResult<i64>;

    // --- Activity & Dashboard ---
    async fn record_activity(&self, entry: NewActivity) -> RepoResult<()>;
    async fn recent_activity(&self, limit: i64) -> RepoResult<Vec<ActivityEntry>>;
    async fn dashboard_stats(&self) -> RepoResult<DashboardStats>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer.
pub type RepositoryState = Arc<dyn Repository>;

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require_profile_name(profile: &NewProfile) -> RepoResult<String> {
    let nome = profile.nome.trim();
    if nome.is_empty() {
        return Err(RepoError::Validation("Informe o nome do perfil.".to_string()));
    }
    Ok(nome.to_string())
}

/// PostgresRepository
///
/// The concrete implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct PermissionRow {
    chave: String,
    visualizar: bool,
    criar: bool,
    editar: bool,
    excluir: bool,
    tudo: bool,
}

impl From<PermissionRow> for (String, Capabilities) {
    fn from(row: PermissionRow) -> Self {
        (
            row.chave,
            Capabilities {
                view: row.visualizar,
                create: row.criar,
                edit: row.editar,
                delete: row.excluir,
                all: row.tudo,
            },
        )
    }
}

/// Inserts the profile and its permission rows on the transaction's connection.
async fn insert_profile(
    tx: &mut Transaction<'_, Postgres>,
    profile: &NewProfile,
) -> RepoResult<i64> {
    let nome = require_profile_name(profile)?;

    let profile_id: i64 = sqlx::query_scalar("INSERT INTO perfis (nome) VALUES ($1) RETURNING id")
        .bind(&nome)
        .fetch_one(&mut **tx)
        .await?;

    for (key, caps) in &profile.permissoes {
        let module_id: Option<i64> = sqlx::query_scalar("SELECT id FROM modulos WHERE chave = $1")
            .bind(key)
            .fetch_optional(&mut **tx)
            .await?;
        let module_id = module_id
            .ok_or_else(|| RepoError::Validation(format!("Módulo desconhecido: {}", key)))?;
        if caps.is_empty() {
            continue;
        }

        sqlx::query(
            r#"INSERT INTO permissoes (perfil_id, modulo_id, visualizar, criar, editar, excluir, tudo)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(profile_id)
        .bind(module_id)
        .bind(caps.view)
        .bind(caps.create)
        .bind(caps.edit)
        .bind(caps.delete)
        .bind(caps.all)
        .execute(&mut **tx)
        .await?;
    }

    Ok(profile_id)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_credentials(&self, email: &str) -> RepoResult<Option<Credentials>> {
        Ok(sqlx::query_as::<_, Credentials>(
            "SELECT id, nome, email, senha_hash, perfil_id, ativo FROM usuarios WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn load_permissions(&self, profile_id: i64) -> RepoResult<PermissionMap> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT m.chave, p.visualizar, p.criar, p.editar, p.excluir, p.tudo
            FROM permissoes p
            JOIN modulos m ON m.id = p.modulo_id
            WHERE p.perfil_id = $1
            "#,
        )
        .bind(profile_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(<(String, Capabilities)>::from).collect())
    }

    async fn list_modules(&self) -> RepoResult<Vec<ModuleInfo>> {
        Ok(
            sqlx::query_as::<_, ModuleInfo>("SELECT id, chave, nome FROM modulos ORDER BY id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.nome, u.email, u.perfil_id, p.nome AS perfil,
                   u.unidade_id, un.nome AS unidade, u.ativo
            FROM usuarios u
            LEFT JOIN perfis p ON p.id = u.perfil_id
            LEFT JOIN unidades un ON un.id = u.unidade_id
            ORDER BY u.nome
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_user(&self, user: NewUser, password_hash: String) -> RepoResult<i64> {
        Ok(sqlx::query_scalar(
            r#"INSERT INTO usuarios (nome, email, senha_hash, perfil_id, unidade_id)
               VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
        )
        .bind(user.nome.trim())
        .bind(user.email.trim().to_lowercase())
        .bind(password_hash)
        .bind(user.perfil_id)
        .bind(user.unidade_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_profiles(&self) -> RepoResult<Vec<Profile>> {
        Ok(sqlx::query_as::<_, Profile>(
            r#"
            SELECT p.id, p.nome, COUNT(pm.id) AS modulos
            FROM perfis p
            LEFT JOIN permissoes pm ON pm.perfil_id = p.id
            GROUP BY p.id, p.nome
            ORDER BY p.nome
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// create_profile
    ///
    /// One pooled connection runs begin / inserts / commit. Any failure rolls the whole
    /// profile back; the connection returns to the pool when the transaction is dropped.
    async fn create_profile(&self, profile: NewProfile) -> RepoResult<i64> {
        let mut tx = self.pool.begin().await?;

        match insert_profile(&mut tx, &profile).await {
            Ok(profile_id) => {
                tx.commit().await?;
                Ok(profile_id)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!("profile rollback failed: {:?}", rollback);
                }
                Err(e)
            }
        }
    }

    async fn list_units(&self) -> RepoResult<Vec<Unit>> {
        Ok(sqlx::query_as::<_, Unit>(
            "SELECT id, nome, cidade, ativo FROM unidades ORDER BY nome",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_unit(&self, unit: NewUnit) -> RepoResult<i64> {
        Ok(
            sqlx::query_scalar("INSERT INTO unidades (nome, cidade) VALUES ($1, $2) RETURNING id")
                .bind(unit.nome.trim())
                .bind(blank_to_none(unit.cidade))
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn list_clients(&self) -> RepoResult<Vec<Client>> {
        Ok(sqlx::query_as::<_, Client>(
            r#"
            SELECT c.id, c.razao_social, c.cnpj, c.email, c.telefone, c.unidade_id, u.nome AS unidade
            FROM clientes c
            LEFT JOIN unidades u ON u.id = c.unidade_id
            ORDER BY c.razao_social
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_client(&self, client: NewClient) -> RepoResult<i64> {
        Ok(sqlx::query_scalar(
            r#"INSERT INTO clientes (razao_social, cnpj, email, telefone, unidade_id)
               VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
        )
        .bind(client.razao_social.trim())
        .bind(client.cnpj.trim())
        .bind(blank_to_none(client.email))
        .bind(blank_to_none(client.telefone))
        .bind(client.unidade_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_services(&self) -> RepoResult<Vec<Service>> {
        Ok(sqlx::query_as::<_, Service>(
            "SELECT id, nome, descricao, valor FROM servicos ORDER BY nome",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_service(&self, service: NewService) -> RepoResult<i64> {
        Ok(sqlx::query_scalar(
            "INSERT INTO servicos (nome, descricao, valor) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(service.nome.trim())
        .bind(blank_to_none(service.descricao))
        .bind(service.valor)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_service_orders(&self) -> RepoResult<Vec<ServiceOrder>> {
        Ok(sqlx::query_as::<_, ServiceOrder>(
            r#"
            SELECT o.id, o.cliente_id, c.razao_social AS cliente, o.servico_id, s.nome AS servico,
                   o.status, o.data_abertura, o.observacoes
            FROM ordens_servico o
            JOIN clientes c ON c.id = o.cliente_id
            JOIN servicos s ON s.id = o.servico_id
            ORDER BY o.data_abertura DESC, o.id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_service_order(&self, order: NewServiceOrder) -> RepoResult<i64> {
        let opened_on = order
            .data_abertura
            .unwrap_or_else(|| Utc::now().date_naive());
        Ok(sqlx::query_scalar(
            r#"INSERT INTO ordens_servico (cliente_id, servico_id, status, data_abertura, observacoes)
               VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
        )
        .bind(order.cliente_id)
        .bind(order.servico_id)
        .bind(ORDER_STATUS_OPEN)
        .bind(opened_on)
        .bind(blank_to_none(order.observacoes))
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_ppe_items(&self) -> RepoResult<Vec<PpeItem>> {
        Ok(sqlx::query_as::<_, PpeItem>(
            "SELECT id, nome, tipo, ca, validade_ca, quantidade FROM epis ORDER BY nome",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_ppe_item(&self, item: NewPpeItem) -> RepoResult<i64> {
        Ok(sqlx::query_scalar(
            r#"INSERT INTO epis (nome, tipo, ca, validade_ca, quantidade)
               VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
        )
        .bind(item.nome.trim())
        .bind(&item.tipo)
        .bind(blank_to_none(item.ca))
        .bind(item.validade_ca)
        .bind(item.quantidade)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_risks(&self) -> RepoResult<Vec<Risk>> {
        Ok(sqlx::query_as::<_, Risk>(
            "SELECT id, descricao, categoria, severidade FROM riscos ORDER BY categoria, descricao",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_risk(&self, risk: NewRisk) -> RepoResult<i64> {
        Ok(sqlx::query_scalar(
            "INSERT INTO riscos (descricao, categoria, severidade) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(risk.descricao.trim())
        .bind(&risk.categoria)
        .bind(&risk.severidade)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn record_activity(&self, entry: NewActivity) -> RepoResult<()> {
        sqlx::query("INSERT INTO log_atividades (usuario_id, acao, detalhe) VALUES ($1, $2, $3)")
            .bind(entry.usuario_id)
            .bind(&entry.acao)
            .bind(&entry.detalhe)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent_activity(&self, limit: i64) -> RepoResult<Vec<ActivityEntry>> {
        Ok(sqlx::query_as::<_, ActivityEntry>(
            r#"
            SELECT l.id, u.nome AS usuario, l.acao, l.detalhe, l.criado_em
            FROM log_atividades l
            LEFT JOIN usuarios u ON u.id = l.usuario_id
            ORDER BY l.criado_em DESC, l.id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    /// dashboard_stats
    ///
    /// All counters in one round trip.
    async fn dashboard_stats(&self) -> RepoResult<DashboardStats> {
        let row: (i64, i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM unidades),
                (SELECT COUNT(*) FROM clientes),
                (SELECT COUNT(*) FROM servicos),
                (SELECT COUNT(*) FROM ordens_servico WHERE status = 'aberta'),
                (SELECT COUNT(*) FROM epis),
                (SELECT COUNT(*) FROM riscos),
                (SELECT COUNT(*) FROM usuarios)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardStats {
            unidades: row.0,
            clientes: row.1,
            servicos: row.2,
            ordens_abertas: row.3,
            epis: row.4,
            riscos: row.5,
            usuarios: row.6,
        })
    }
}

// --- In-memory implementation ---

#[derive(Default)]
struct Tables {
    next_id: i64,
    modules: Vec<ModuleInfo>,
    profiles: Vec<(i64, String)>,
    permissions: Vec<(i64, String, Capabilities)>,
    credentials: Vec<(Credentials, Option<i64>)>,
    units: Vec<Unit>,
    clients: Vec<Client>,
    services: Vec<Service>,
    orders: Vec<ServiceOrder>,
    ppe: Vec<PpeItem>,
    risks: Vec<Risk>,
    activity: Vec<ActivityEntry>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn unit_name(&self, id: Option<i64>) -> Option<String> {
        id.and_then(|id| self.units.iter().find(|u| u.id == id))
            .map(|u| u.nome.clone())
    }
}

/// MockRepository
///
/// In-memory `Repository` with the same uniqueness rules and all-or-nothing profile
/// creation as the Postgres schema. Setting `unavailable` makes every call fail as if the
/// pool had timed out.
pub struct MockRepository {
    tables: Mutex<Tables>,
    pub unavailable: bool,
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRepository {
    /// Starts with the module catalogue in place, like the initial migration.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        for module in Module::ALL {
            let id = tables.next_id();
            tables.modules.push(ModuleInfo {
                id,
                chave: module.key().to_string(),
                nome: module.title().to_string(),
            });
        }
        Self {
            tables: Mutex::new(tables),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    fn tables(&self) -> RepoResult<MutexGuard<'_, Tables>> {
        if self.unavailable {
            return Err(RepoError::Database(sqlx::Error::PoolTimedOut));
        }
        // A poisoned lock only means another test thread panicked mid-write.
        Ok(self.tables.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Seeds a profile with its permission snapshot and returns its id.
    pub fn seed_profile(&self, nome: &str, permissions: &[(Module, Capabilities)]) -> i64 {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let id = t.next_id();
        t.profiles.push((id, nome.to_string()));
        for (module, caps) in permissions {
            t.permissions.push((id, module.key().to_string(), *caps));
        }
        id
    }

    /// Seeds an active account and returns its id.
    pub fn seed_user(&self, nome: &str, email: &str, password_hash: &str, profile_id: Option<i64>) -> i64 {
        let mut t = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        let id = t.next_id();
        t.credentials.push((
            Credentials {
                id,
                nome: nome.to_string(),
                email: email.to_string(),
                senha_hash: password_hash.to_string(),
                perfil_id: profile_id,
                ativo: true,
            },
            None,
        ));
        id
    }

    pub fn profile_count(&self) -> usize {
        self.tables.lock().unwrap_or_else(|e| e.into_inner()).profiles.len()
    }

    pub fn permission_row_count(&self) -> usize {
        self.tables.lock().unwrap_or_else(|e| e.into_inner()).permissions.len()
    }

    pub fn activity(&self) -> Vec<ActivityEntry> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner()).activity.clone()
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn find_credentials(&self, email: &str) -> RepoResult<Option<Credentials>> {
        let t = self.tables()?;
        Ok(t.credentials
            .iter()
            .find(|(c, _)| c.email == email)
            .map(|(c, _)| c.clone()))
    }

    async fn load_permissions(&self, profile_id: i64) -> RepoResult<PermissionMap> {
        let t = self.tables()?;
        Ok(t.permissions
            .iter()
            .filter(|(id, _, _)| *id == profile_id)
            .map(|(_, key, caps)| (key.clone(), *caps))
            .collect())
    }

    async fn list_modules(&self) -> RepoResult<Vec<ModuleInfo>> {
        Ok(self.tables()?.modules.clone())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let t = self.tables()?;
        Ok(t.credentials
            .iter()
            .map(|(c, unit_id)| User {
                id: c.id,
                nome: c.nome.clone(),
                email: c.email.clone(),
                perfil_id: c.perfil_id,
                perfil: c
                    .perfil_id
                    .and_then(|pid| t.profiles.iter().find(|(id, _)| *id == pid))
                    .map(|(_, nome)| nome.clone()),
                unidade_id: *unit_id,
                unidade: t.unit_name(*unit_id),
                ativo: c.ativo,
            })
            .collect())
    }

    async fn create_user(&self, user: NewUser, password_hash: String) -> RepoResult<i64> {
        let mut t = self.tables()?;
        let email = user.email.trim().to_lowercase();
        if t.credentials.iter().any(|(c, _)| c.email == email) {
            return Err(RepoError::Duplicate("usuarios_email_key".to_string()));
        }
        if !t.profiles.iter().any(|(id, _)| *id == user.perfil_id) {
            return Err(RepoError::Validation("Registro relacionado não encontrado.".to_string()));
        }
        let id = t.next_id();
        t.credentials.push((
            Credentials {
                id,
                nome: user.nome.trim().to_string(),
                email,
                senha_hash: password_hash,
                perfil_id: Some(user.perfil_id),
                ativo: true,
            },
            user.unidade_id,
        ));
        Ok(id)
    }

    async fn list_profiles(&self) -> RepoResult<Vec<Profile>> {
        let t = self.tables()?;
        Ok(t.profiles
            .iter()
            .map(|(id, nome)| Profile {
                id: *id,
                nome: nome.clone(),
                modulos: t.permissions.iter().filter(|(pid, _, _)| pid == id).count() as i64,
            })
            .collect())
    }

    async fn create_profile(&self, profile: NewProfile) -> RepoResult<i64> {
        let mut t = self.tables()?;

        // Everything is checked before the first write, so a failure leaves no rows behind.
        let nome = require_profile_name(&profile)?;
        if t.profiles.iter().any(|(_, existing)| *existing == nome) {
            return Err(RepoError::Duplicate("perfis_nome_key".to_string()));
        }
        for key in profile.permissoes.keys() {
            if !t.modules.iter().any(|m| &m.chave == key) {
                return Err(RepoError::Validation(format!("Módulo desconhecido: {}", key)));
            }
        }

        let id = t.next_id();
        t.profiles.push((id, nome));
        for (key, caps) in profile.permissoes {
            if !caps.is_empty() {
                t.permissions.push((id, key, caps));
            }
        }
        Ok(id)
    }

    async fn list_units(&self) -> RepoResult<Vec<Unit>> {
        Ok(self.tables()?.units.clone())
    }

    async fn create_unit(&self, unit: NewUnit) -> RepoResult<i64> {
        let mut t = self.tables()?;
        let nome = unit.nome.trim().to_string();
        if t.units.iter().any(|u| u.nome == nome) {
            return Err(RepoError::Duplicate("unidades_nome_key".to_string()));
        }
        let id = t.next_id();
        t.units.push(Unit {
            id,
            nome,
            cidade: blank_to_none(unit.cidade),
            ativo: true,
        });
        Ok(id)
    }

    async fn list_clients(&self) -> RepoResult<Vec<Client>> {
        let t = self.tables()?;
        Ok(t.clients
            .iter()
            .map(|c| Client {
                unidade: t.unit_name(c.unidade_id),
                ..c.clone()
            })
            .collect())
    }

    async fn create_client(&self, client: NewClient) -> RepoResult<i64> {
        let mut t = self.tables()?;
        let cnpj = client.cnpj.trim().to_string();
        if t.clients.iter().any(|c| c.cnpj == cnpj) {
            return Err(RepoError::Duplicate("clientes_cnpj_key".to_string()));
        }
        let id = t.next_id();
        t.clients.push(Client {
            id,
            razao_social: client.razao_social.trim().to_string(),
            cnpj,
            email: blank_to_none(client.email),
            telefone: blank_to_none(client.telefone),
            unidade_id: client.unidade_id,
            unidade: None,
        });
        Ok(id)
    }

    async fn list_services(&self) -> RepoResult<Vec<Service>> {
        Ok(self.tables()?.services.clone())
    }

    async fn create_service(&self, service: NewService) -> RepoResult<i64> {
        let mut t = self.tables()?;
        let nome = service.nome.trim().to_string();
        if t.services.iter().any(|s| s.nome == nome) {
            return Err(RepoError::Duplicate("servicos_nome_key".to_string()));
        }
        let id = t.next_id();
        t.services.push(Service {
            id,
            nome,
            descricao: blank_to_none(service.descricao),
            valor: service.valor,
        });
        Ok(id)
    }

    async fn list_service_orders(&self) -> RepoResult<Vec<ServiceOrder>> {
        Ok(self.tables()?.orders.clone())
    }

    async fn create_service_order(&self, order: NewServiceOrder) -> RepoResult<i64> {
        let mut t = self.tables()?;
        let client = t.clients.iter().find(|c| c.id == order.cliente_id).cloned();
        let service = t.services.iter().find(|s| s.id == order.servico_id).cloned();
        let (Some(client), Some(service)) = (client, service) else {
            return Err(RepoError::Validation("Registro relacionado não encontrado.".to_string()));
        };
        let id = t.next_id();
        t.orders.push(ServiceOrder {
            id,
            cliente_id: client.id,
            cliente: client.razao_social,
            servico_id: service.id,
            servico: service.nome,
            status: ORDER_STATUS_OPEN.to_string(),
            data_abertura: order
                .data_abertura
                .unwrap_or_else(|| Utc::now().date_naive()),
            observacoes: blank_to_none(order.observacoes),
        });
        Ok(id)
    }

    async fn list_ppe_items(&self) -> RepoResult<Vec<PpeItem>> {
        Ok(self.tables()?.ppe.clone())
    }

    async fn create_ppe_item(&self, item: NewPpeItem) -> RepoResult<i64> {
        let mut t = self.tables()?;
        let id = t.next_id();
        t.ppe.push(PpeItem {
            id,
            nome: item.nome.trim().to_string(),
            tipo: item.tipo,
            ca: blank_to_none(item.ca),
            validade_ca: item.validade_ca,
            quantidade: item.quantidade,
        });
        Ok(id)
    }

    async fn list_risks(&self) -> RepoResult<Vec<Risk>> {
        Ok(self.tables()?.risks.clone())
    }

    async fn create_risk(&self, risk: NewRisk) -> RepoResult<i64> {
        let mut t = self.tables()?;
        let id = t.next_id();
        t.risks.push(Risk {
            id,
            descricao: risk.descricao.trim().to_string(),
            categoria: risk.categoria,
            severidade: risk.severidade,
        });
        Ok(id)
    }

    async fn record_activity(&self, entry: NewActivity) -> RepoResult<()> {
        let mut t = self.tables()?;
        let id = t.next_id();
        let usuario = entry
            .usuario_id
            .and_then(|uid| t.credentials.iter().find(|(c, _)| c.id == uid))
            .map(|(c, _)| c.nome.clone());
        t.activity.push(ActivityEntry {
            id,
            usuario,
            acao: entry.acao,
            detalhe: entry.detalhe,
            criado_em: Utc::now(),
        });
        Ok(())
    }

    async fn recent_activity(&self, limit: i64) -> RepoResult<Vec<ActivityEntry>> {
        let t = self.tables()?;
        Ok(t.activity
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn dashboard_stats(&self) -> RepoResult<DashboardStats> {
        let t = self.tables()?;
        Ok(DashboardStats {
            unidades: t.units.len() as i64,
            clientes: t.clients.len() as i64,
            servicos: t.services.len() as i64,
            ordens_abertas: t
                .orders
                .iter()
                .filter(|o| o.status == ORDER_STATUS_OPEN)
                .count() as i64,
            epis: t.ppe.len() as i64,
            riscos: t.risks.len() as i64,
            usuarios: t.credentials.len() as i64,
        })
    }
}
