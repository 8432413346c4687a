use raven_admin::{
    models::{JsonReply, NewClient, NewPpeItem, NewProfile, NewRisk, NewService, NewUnit, NewUser},
    permissions::{Action, Capabilities, PermissionMap},
};
use serde_json::json;
use validator::Validate;

// --- Capability Records ---

#[test]
fn test_capability_flags_accept_booleans_and_numbers() {
    let caps: Capabilities =
        serde_json::from_value(json!({ "view": 1, "create": true, "edit": 0, "delete": "1" }))
            .expect("capabilities should deserialize");

    assert!(caps.view);
    assert!(caps.create);
    assert!(!caps.edit);
    assert!(caps.delete);
    assert!(!caps.all);
}

#[test]
fn test_capability_flags_accept_portuguese_names() {
    let caps: Capabilities = serde_json::from_value(json!({
        "visualizar": 1,
        "criar": 0,
        "editar": false,
        "excluir": null,
        "tudo": 1.0,
    }))
    .expect("aliased capabilities should deserialize");

    assert_eq!(
        caps,
        Capabilities {
            view: true,
            create: false,
            edit: false,
            delete: false,
            all: true,
        }
    );
}

#[test]
fn test_anything_but_one_or_true_is_denied() {
    let caps: Capabilities =
        serde_json::from_value(json!({ "view": 2, "create": "yes", "edit": -1 }))
            .expect("odd values still deserialize");

    assert!(caps.is_empty());
    // Missing keys default to denied.
    let empty: Capabilities = serde_json::from_value(json!({})).unwrap();
    assert_eq!(empty, Capabilities::default());
}

#[test]
fn test_all_flag_grants_every_action() {
    let caps = Capabilities::only(&[Action::All]);
    for action in Action::EVERY {
        assert!(caps.allows(action), "all should grant {}", action);
    }

    let view_only = Capabilities::only(&[Action::View]);
    assert!(view_only.allows(Action::View));
    assert!(!view_only.allows(Action::Create));
    assert!(!view_only.allows(Action::All));
}

#[test]
fn test_absent_module_is_denied() {
    let map: PermissionMap = [("epi", Capabilities::only(&[Action::View]))]
        .into_iter()
        .collect();

    assert!(map.allows("epi", Action::View));
    assert!(!map.allows("epi", Action::Delete));
    assert!(!map.allows("riscos", Action::View));
    assert!(!PermissionMap::new().allows("epi", Action::View));
}

#[test]
fn test_permission_map_survives_session_serialization() {
    let mut map = PermissionMap::new();
    map.insert("clientes", Capabilities::only(&[Action::View, Action::Create]));

    let stored = serde_json::to_value(&map).unwrap();
    assert_eq!(stored["clientes"]["view"], json!(true));

    let restored: PermissionMap = serde_json::from_value(stored).unwrap();
    assert_eq!(restored, map);
}

#[test]
fn test_new_profile_tolerates_missing_fields() {
    let profile: NewProfile = serde_json::from_value(json!({})).unwrap();
    assert!(profile.nome.is_empty());
    assert!(profile.permissoes.is_empty());
}

#[test]
fn test_profile_name_must_not_be_blank() {
    for nome in ["", "   "] {
        let profile = NewProfile {
            nome: nome.to_string(),
            ..NewProfile::default()
        };
        let errors = profile.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("nome"));
    }

    let named = NewProfile {
        nome: "Técnico".to_string(),
        ..NewProfile::default()
    };
    assert!(named.validate().is_ok());
}

// --- Form Payload Validation ---

#[test]
fn test_unit_requires_a_name() {
    let unit = NewUnit {
        nome: String::new(),
        cidade: None,
    };
    assert!(unit.validate().is_err());
}

#[test]
fn test_user_password_and_email_rules() {
    let mut user = NewUser {
        nome: "Ana".to_string(),
        email: "ana@raven.local".to_string(),
        senha: "123".to_string(),
        perfil_id: 1,
        unidade_id: None,
    };
    let errors = user.validate().unwrap_err();
    assert!(errors.field_errors().contains_key("senha"));

    user.senha = "123456".to_string();
    assert!(user.validate().is_ok());

    user.email = "not-an-email".to_string();
    assert!(user.validate().is_err());
}

#[test]
fn test_client_cnpj_length_and_optional_email() {
    let mut client = NewClient {
        razao_social: "Acme Ltda".to_string(),
        cnpj: "12.345.678/0001-90".to_string(),
        email: None,
        telefone: None,
        unidade_id: None,
    };
    assert!(client.validate().is_ok());

    client.cnpj = "123".to_string();
    assert!(client.validate().is_err());
}

#[test]
fn test_service_value_cannot_be_negative() {
    let service = NewService {
        nome: "Treinamento NR-35".to_string(),
        descricao: None,
        valor: -10.0,
    };
    assert!(service.validate().is_err());
}

#[test]
fn test_ppe_kind_must_be_epi_or_epc() {
    let mut item = NewPpeItem {
        nome: "Capacete".to_string(),
        tipo: "EPI".to_string(),
        ca: Some("12345".to_string()),
        validade_ca: None,
        quantidade: 10,
    };
    assert!(item.validate().is_ok());

    item.tipo = "outro".to_string();
    let errors = item.validate().unwrap_err();
    assert!(errors.field_errors().contains_key("tipo"));
}

#[test]
fn test_risk_category_and_severity_are_closed_lists() {
    let mut risk = NewRisk {
        descricao: "Ruído contínuo".to_string(),
        categoria: "físico".to_string(),
        severidade: "alta".to_string(),
    };
    assert!(risk.validate().is_ok());

    risk.severidade = "extrema".to_string();
    assert!(risk.validate().is_err());
}

// --- JSON Replies ---

#[test]
fn test_json_reply_omits_missing_id() {
    let reply = JsonReply {
        success: false,
        message: "Registro já existe.".to_string(),
        id: None,
    };
    let value = serde_json::to_value(&reply).unwrap();
    assert_eq!(value, json!({ "success": false, "message": "Registro já existe." }));
}
