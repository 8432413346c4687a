use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

/// Action
///
/// The operations a profile can be granted on a module. Serialized in lowercase
/// (`"view"`, `"create"`, ...), which is also the key used in the capability record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Action {
    #[default]
    View,
    Create,
    Edit,
    Delete,
    All,
}

impl Action {
    pub const EVERY: [Action; 5] = [
        Action::View,
        Action::Create,
        Action::Edit,
        Action::Delete,
        Action::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::All => "all",
        }
    }

    /// Label shown in the profile permission matrix.
    pub fn label(&self) -> &'static str {
        match self {
            Action::View => "Visualizar",
            Action::Create => "Criar",
            Action::Edit => "Editar",
            Action::Delete => "Excluir",
            Action::All => "Tudo",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities
///
/// The action-capability record of one module. Flags arrive from the database and from
/// the profile form either as booleans or as `0`/`1`; anything that is not `true` or `1`
/// counts as denied, and a missing key is denied as well.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct Capabilities {
    #[serde(default, alias = "visualizar", deserialize_with = "truthy")]
    pub view: bool,
    #[serde(default, alias = "criar", deserialize_with = "truthy")]
    pub create: bool,
    #[serde(default, alias = "editar", deserialize_with = "truthy")]
    pub edit: bool,
    #[serde(default, alias = "excluir", deserialize_with = "truthy")]
    pub delete: bool,
    #[serde(default, alias = "tudo", deserialize_with = "truthy")]
    pub all: bool,
}

impl Capabilities {
    /// A record granting every action.
    pub fn full() -> Self {
        Self {
            view: true,
            create: true,
            edit: true,
            delete: true,
            all: true,
        }
    }

    /// A record granting only the listed actions.
    pub fn only(actions: &[Action]) -> Self {
        let mut caps = Self::default();
        for action in actions {
            match action {
                Action::View => caps.view = true,
                Action::Create => caps.create = true,
                Action::Edit => caps.edit = true,
                Action::Delete => caps.delete = true,
                Action::All => caps.all = true,
            }
        }
        caps
    }

    /// `all` grants every action; otherwise the exact flag decides.
    pub fn allows(&self, action: Action) -> bool {
        if self.all {
            return true;
        }
        match action {
            Action::View => self.view,
            Action::Create => self.create,
            Action::Edit => self.edit,
            Action::Delete => self.delete,
            Action::All => false,
        }
    }

    /// True when no flag is set. Profile creation skips such records.
    pub fn is_empty(&self) -> bool {
        !(self.view || self.create || self.edit || self.delete || self.all)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n == 1,
        Some(Flag::Float(n)) => n == 1.0,
        Some(Flag::Text(s)) => matches!(s.trim(), "1" | "true"),
        None => false,
    })
}

/// PermissionMap
///
/// Snapshot of a profile's permissions, keyed by module key. Loaded once at login and
/// stored in the session unchanged until the next login.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(HashMap<String, Capabilities>);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: impl Into<String>, caps: Capabilities) {
        self.0.insert(module.into(), caps);
    }

    pub fn get(&self, module: &str) -> Option<&Capabilities> {
        self.0.get(module)
    }

    /// An absent module is equivalent to every action denied.
    pub fn allows(&self, module: &str, action: Action) -> bool {
        self.get(module).is_some_and(|caps| caps.allows(action))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Capabilities)> for PermissionMap {
    fn from_iter<I: IntoIterator<Item = (K, Capabilities)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
