use raven_admin::{
    AppConfig, MockRepository,
    auth,
    catalog::Module,
    permissions::Action,
    repository::Repository,
    seed::{self, ADMIN_PROFILE},
};

fn config_with_admin() -> AppConfig {
    AppConfig {
        seed_admin_email: Some("admin@raven.local".to_string()),
        seed_admin_password: Some("admin-inicial".to_string()),
        ..AppConfig::default()
    }
}

#[tokio::test]
async fn test_bootstrap_creates_full_access_administrator() {
    let repo = MockRepository::new();

    let user_id = seed::bootstrap_admin(&repo, &config_with_admin())
        .await
        .unwrap()
        .expect("an administrator should be created");

    let credentials = repo
        .find_credentials("admin@raven.local")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(credentials.id, user_id);
    assert!(auth::verify_password("admin-inicial", &credentials.senha_hash));

    let permissions = repo
        .load_permissions(credentials.perfil_id.unwrap())
        .await
        .unwrap();
    for module in Module::ALL {
        assert!(permissions.allows(module.key(), Action::Delete), "{}", module);
    }

    let profiles = repo.list_profiles().await.unwrap();
    assert_eq!(profiles[0].nome, ADMIN_PROFILE);
    assert!(repo.activity().iter().any(|a| a.acao == "bootstrap"));
}

#[tokio::test]
async fn test_bootstrap_without_configuration_does_nothing() {
    let repo = MockRepository::new();

    let result = seed::bootstrap_admin(&repo, &AppConfig::default())
        .await
        .unwrap();

    assert_eq!(result, None);
    assert_eq!(repo.profile_count(), 0);
}

#[tokio::test]
async fn test_bootstrap_skips_when_accounts_exist() {
    let repo = MockRepository::new();
    repo.seed_user("Existente", "existente@raven.local", "hash", None);

    let result = seed::bootstrap_admin(&repo, &config_with_admin())
        .await
        .unwrap();

    assert_eq!(result, None);
    assert!(repo.find_credentials("admin@raven.local").await.unwrap().is_none());
}

#[tokio::test]
async fn test_bootstrap_reuses_a_leftover_admin_profile() {
    let repo = MockRepository::new();
    let leftover = repo.seed_profile(ADMIN_PROFILE, &[]);

    seed::bootstrap_admin(&repo, &config_with_admin())
        .await
        .unwrap()
        .unwrap();

    let credentials = repo
        .find_credentials("admin@raven.local")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(credentials.perfil_id, Some(leftover));
    assert_eq!(repo.profile_count(), 1);
}
