use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

use crate::permissions::Capabilities;

// --- Identity & Access (mapped to `usuarios`, `perfis`, `modulos`) ---

/// Credentials
///
/// Login lookup row. Never serialized: the hash only travels between the repository and
/// the password verifier.
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub id: i64,
    pub nome: String,
    pub email: String,
    pub senha_hash: String,
    pub perfil_id: Option<i64>,
    pub ativo: bool,
}

/// User
///
/// A back-office account as listed on `/usuarios`, joined with its profile and unit names.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, ToSchema, TS)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub nome: String,
    pub email: String,
    pub perfil_id: Option<i64>,
    #[sqlx(default)]
    pub perfil: Option<String>,
    pub unidade_id: Option<i64>,
    #[sqlx(default)]
    pub unidade: Option<String>,
    pub ativo: bool,
}

/// NewUser
///
/// Payload of `POST /usuarios/salvar`. The plain password is hashed before it reaches
/// the repository.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema, TS)]
#[ts(export)]
pub struct NewUser {
    #[validate(length(min = 1, message = "Informe o nome."))]
    pub nome: String,
    #[validate(email(message = "Informe um e-mail válido."))]
    pub email: String,
    #[validate(length(min = 6, message = "A senha deve ter ao menos 6 caracteres."))]
    pub senha: String,
    pub perfil_id: i64,
    pub unidade_id: Option<i64>,
}

/// Profile
///
/// A role, listed with the number of modules it has permission rows for.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, ToSchema, TS)]
#[ts(export)]
pub struct Profile {
    pub id: i64,
    pub nome: String,
    pub modulos: i64,
}

/// NewProfile
///
/// Payload of `POST /perfis/salvar`: the profile name and its per-module capability
/// records. Stored in a single transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema, TS)]
#[ts(export)]
pub struct NewProfile {
    #[serde(default)]
    #[validate(custom(function = "validate_profile_name"))]
    pub nome: String,
    #[serde(default)]
    pub permissoes: HashMap<String, Capabilities>,
}

fn validate_profile_name(nome: &str) -> Result<(), validator::ValidationError> {
    if nome.trim().is_empty() {
        Err(validator::ValidationError::new("nome").with_message("Informe o nome do perfil.".into()))
    } else {
        Ok(())
    }
}

/// ModuleInfo
///
/// Row of the `modulos` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ModuleInfo {
    pub id: i64,
    pub chave: String,
    pub nome: String,
}

// --- Organisation & Business Records ---

/// Unit
///
/// An organizational unit (branch). Clients and users may be attached to one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, ToSchema, TS)]
#[ts(export)]
pub struct Unit {
    pub id: i64,
    pub nome: String,
    pub cidade: Option<String>,
    pub ativo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema, TS)]
#[ts(export)]
pub struct NewUnit {
    #[validate(length(min = 1, message = "Informe o nome da unidade."))]
    pub nome: String,
    pub cidade: Option<String>,
}

/// Client
///
/// A customer company. `cnpj` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, ToSchema, TS)]
#[ts(export)]
pub struct Client {
    pub id: i64,
    pub razao_social: String,
    pub cnpj: String,
    pub email: Option<String>,
    pub telefone: Option<String>,
    pub unidade_id: Option<i64>,
    #[sqlx(default)]
    pub unidade: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema, TS)]
#[ts(export)]
pub struct NewClient {
    #[validate(length(min = 1, message = "Informe a razão social."))]
    pub razao_social: String,
    #[validate(length(min = 14, max = 18, message = "Informe um CNPJ válido."))]
    pub cnpj: String,
    #[validate(email(message = "Informe um e-mail válido."))]
    pub email: Option<String>,
    pub telefone: Option<String>,
    pub unidade_id: Option<i64>,
}

/// Service
///
/// An occupational-safety service offered to clients (training, inspection, PPRA/PGR...).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, ToSchema, TS)]
#[ts(export)]
pub struct Service {
    pub id: i64,
    pub nome: String,
    pub descricao: Option<String>,
    pub valor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema, TS)]
#[ts(export)]
pub struct NewService {
    #[validate(length(min = 1, message = "Informe o nome do serviço."))]
    pub nome: String,
    pub descricao: Option<String>,
    #[validate(range(min = 0.0, message = "O valor não pode ser negativo."))]
    pub valor: f64,
}

/// ServiceOrder
///
/// A service ordered by a client, joined with the client and service names.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, ToSchema, TS)]
#[ts(export)]
pub struct ServiceOrder {
    pub id: i64,
    pub cliente_id: i64,
    pub cliente: String,
    pub servico_id: i64,
    pub servico: String,
    pub status: String,
    pub data_abertura: NaiveDate,
    pub observacoes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema, TS)]
#[ts(export)]
pub struct NewServiceOrder {
    pub cliente_id: i64,
    pub servico_id: i64,
    /// Defaults to today.
    pub data_abertura: Option<NaiveDate>,
    pub observacoes: Option<String>,
}

pub const ORDER_STATUS_OPEN: &str = "aberta";

/// PpeItem
///
/// Inventory entry of personal (EPI) or collective (EPC) protective equipment. EPIs carry
/// a Certificate of Approval (CA) number and its validity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, ToSchema, TS)]
#[ts(export)]
pub struct PpeItem {
    pub id: i64,
    pub nome: String,
    pub tipo: String,
    pub ca: Option<String>,
    pub validade_ca: Option<NaiveDate>,
    pub quantidade: i32,
}

pub const PPE_KINDS: [&str; 2] = ["EPI", "EPC"];

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema, TS)]
#[ts(export)]
pub struct NewPpeItem {
    #[validate(length(min = 1, message = "Informe o nome do equipamento."))]
    pub nome: String,
    #[validate(custom(function = "validate_ppe_kind"))]
    pub tipo: String,
    pub ca: Option<String>,
    pub validade_ca: Option<NaiveDate>,
    #[validate(range(min = 0, message = "A quantidade não pode ser negativa."))]
    pub quantidade: i32,
}

fn validate_ppe_kind(tipo: &str) -> Result<(), validator::ValidationError> {
    if PPE_KINDS.contains(&tipo) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("tipo").with_message("Tipo deve ser EPI ou EPC.".into()))
    }
}

/// Risk
///
/// Entry of the occupational risk registry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, ToSchema, TS)]
#[ts(export)]
pub struct Risk {
    pub id: i64,
    pub descricao: String,
    pub categoria: String,
    pub severidade: String,
}

pub const RISK_CATEGORIES: [&str; 5] = ["físico", "químico", "biológico", "ergonômico", "acidente"];
pub const RISK_SEVERITIES: [&str; 4] = ["baixa", "média", "alta", "crítica"];

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema, TS)]
#[ts(export)]
pub struct NewRisk {
    #[validate(length(min = 1, message = "Informe a descrição do risco."))]
    pub descricao: String,
    #[validate(custom(function = "validate_risk_category"))]
    pub categoria: String,
    #[validate(custom(function = "validate_risk_severity"))]
    pub severidade: String,
}

fn validate_risk_category(categoria: &str) -> Result<(), validator::ValidationError> {
    if RISK_CATEGORIES.contains(&categoria) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("categoria").with_message("Categoria de risco inválida.".into()))
    }
}

fn validate_risk_severity(severidade: &str) -> Result<(), validator::ValidationError> {
    if RISK_SEVERITIES.contains(&severidade) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("severidade").with_message("Severidade inválida.".into()))
    }
}

// --- Activity Log & Dashboard ---

/// ActivityEntry
///
/// Row of `log_atividades`, joined with the acting user's name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityEntry {
    pub id: i64,
    #[sqlx(default)]
    pub usuario: Option<String>,
    pub acao: String,
    pub detalhe: Option<String>,
    pub criado_em: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub usuario_id: Option<i64>,
    pub acao: String,
    pub detalhe: Option<String>,
}

impl NewActivity {
    pub fn new(usuario_id: Option<i64>, acao: &str, detalhe: impl Into<String>) -> Self {
        Self {
            usuario_id,
            acao: acao.to_string(),
            detalhe: Some(detalhe.into()),
        }
    }
}

/// DashboardStats
///
/// Counters shown on `/dashboard`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct DashboardStats {
    pub unidades: i64,
    pub clientes: i64,
    pub servicos: i64,
    pub ordens_abertas: i64,
    pub epis: i64,
    pub riscos: i64,
    pub usuarios: i64,
}

// --- JSON Replies ---

/// JsonReply
///
/// Answer of every form-submission endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct JsonReply {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// CaValidity
///
/// Answer of the Certificate of Approval lookup.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct CaValidity {
    pub validade: String,
}
