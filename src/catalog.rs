//! The functional areas of the back office.
//!
//! A [`Module`] is the unit of permission granularity: its key names the entry in the
//! session's permission map, the URL prefix of its routes and the row in the `modulos`
//! table. The catalogue also carries the list columns and form fields the generic
//! templates render.

use serde::Serialize;
use std::fmt;

use crate::permissions::{Action, PermissionMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    Units,
    Clients,
    Services,
    ServiceOrders,
    Ppe,
    Risks,
    Users,
    Profiles,
}

/// A column of a module's list page. `key` is the field name in the serialized row.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Number,
    Date,
    Textarea,
    Select,
}

/// An input of a module's creation form. Select fields take their options from the
/// `options` entry named after the field.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

// Struct literals keep the slices below promotable to `'static`.
macro_rules! col {
    ($key:literal, $label:literal) => {
        Column {
            key: $key,
            label: $label,
        }
    };
}

macro_rules! field {
    ($name:literal, $label:literal, $kind:ident, $required:literal) => {
        Field {
            name: $name,
            label: $label,
            kind: FieldKind::$kind,
            required: $required,
        }
    };
}

/// Entry of the navigation menu.
#[derive(Debug, Clone, Serialize)]
pub struct MenuEntry {
    pub key: &'static str,
    pub title: &'static str,
    pub path: String,
}

impl Module {
    pub const ALL: [Module; 8] = [
        Module::Units,
        Module::Clients,
        Module::Services,
        Module::ServiceOrders,
        Module::Ppe,
        Module::Risks,
        Module::Users,
        Module::Profiles,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Module::Units => "unidades",
            Module::Clients => "clientes",
            Module::Services => "servicos",
            Module::ServiceOrders => "ordens-servico",
            Module::Ppe => "epi",
            Module::Risks => "riscos",
            Module::Users => "usuarios",
            Module::Profiles => "perfis",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Module::Units => "Unidades",
            Module::Clients => "Clientes",
            Module::Services => "Serviços",
            Module::ServiceOrders => "Ordens de Serviço",
            Module::Ppe => "EPI / EPC",
            Module::Risks => "Riscos",
            Module::Users => "Usuários",
            Module::Profiles => "Perfis",
        }
    }

    pub fn from_key(key: &str) -> Option<Module> {
        Module::ALL.into_iter().find(|m| m.key() == key)
    }

    pub fn path(&self) -> String {
        format!("/{}", self.key())
    }

    pub fn columns(&self) -> &'static [Column] {
        match self {
            Module::Units => &[col!("id", "#"), col!("nome", "Nome"), col!("cidade", "Cidade")],
            Module::Clients => &[
                col!("id", "#"),
                col!("razao_social", "Razão social"),
                col!("cnpj", "CNPJ"),
                col!("email", "E-mail"),
                col!("telefone", "Telefone"),
                col!("unidade", "Unidade"),
            ],
            Module::Services => &[
                col!("id", "#"),
                col!("nome", "Nome"),
                col!("descricao", "Descrição"),
                col!("valor", "Valor"),
            ],
            Module::ServiceOrders => &[
                col!("id", "#"),
                col!("cliente", "Cliente"),
                col!("servico", "Serviço"),
                col!("status", "Status"),
                col!("data_abertura", "Abertura"),
            ],
            Module::Ppe => &[
                col!("id", "#"),
                col!("nome", "Nome"),
                col!("tipo", "Tipo"),
                col!("ca", "CA"),
                col!("validade_ca", "Validade do CA"),
                col!("quantidade", "Quantidade"),
            ],
            Module::Risks => &[
                col!("id", "#"),
                col!("descricao", "Descrição"),
                col!("categoria", "Categoria"),
                col!("severidade", "Severidade"),
            ],
            Module::Users => &[
                col!("id", "#"),
                col!("nome", "Nome"),
                col!("email", "E-mail"),
                col!("perfil", "Perfil"),
                col!("unidade", "Unidade"),
            ],
            Module::Profiles => &[col!("id", "#"), col!("nome", "Nome"), col!("modulos", "Módulos")],
        }
    }

    pub fn fields(&self) -> &'static [Field] {
        match self {
            Module::Units => &[
                field!("nome", "Nome", Text, true),
                field!("cidade", "Cidade", Text, false),
            ],
            Module::Clients => &[
                field!("razao_social", "Razão social", Text, true),
                field!("cnpj", "CNPJ", Text, true),
                field!("email", "E-mail", Email, false),
                field!("telefone", "Telefone", Text, false),
                field!("unidade_id", "Unidade", Select, false),
            ],
            Module::Services => &[
                field!("nome", "Nome", Text, true),
                field!("descricao", "Descrição", Textarea, false),
                field!("valor", "Valor", Number, true),
            ],
            Module::ServiceOrders => &[
                field!("cliente_id", "Cliente", Select, true),
                field!("servico_id", "Serviço", Select, true),
                field!("data_abertura", "Data de abertura", Date, false),
                field!("observacoes", "Observações", Textarea, false),
            ],
            Module::Ppe => &[
                field!("nome", "Nome", Text, true),
                field!("tipo", "Tipo", Select, true),
                field!("ca", "Número do CA", Text, false),
                field!("validade_ca", "Validade do CA", Date, false),
                field!("quantidade", "Quantidade", Number, true),
            ],
            Module::Risks => &[
                field!("descricao", "Descrição", Textarea, true),
                field!("categoria", "Categoria", Select, true),
                field!("severidade", "Severidade", Select, true),
            ],
            Module::Users => &[
                field!("nome", "Nome", Text, true),
                field!("email", "E-mail", Email, true),
                field!("senha", "Senha", Password, true),
                field!("perfil_id", "Perfil", Select, true),
                field!("unidade_id", "Unidade", Select, false),
            ],
            Module::Profiles => &[field!("nome", "Nome", Text, true)],
        }
    }

    /// Modules the snapshot may view, in catalogue order.
    pub fn menu(permissions: &PermissionMap) -> Vec<MenuEntry> {
        Module::ALL
            .into_iter()
            .filter(|m| permissions.allows(m.key(), Action::View))
            .map(|m| MenuEntry {
                key: m.key(),
                title: m.title(),
                path: m.path(),
            })
            .collect()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
