//! First-run bootstrap: an administrator profile and account so a fresh database can be
//! logged into.

use crate::{
    AppConfig,
    auth::hash_password,
    catalog::Module,
    error::{AppError, RepoError},
    models::{NewActivity, NewProfile, NewUser},
    permissions::Capabilities,
    repository::Repository,
};

pub const ADMIN_PROFILE: &str = "Administrador";

/// Creates the administrator when `SEED_ADMIN_EMAIL`/`SEED_ADMIN_PASSWORD` are set and no
/// account exists yet. Returns the new user id, or `None` when nothing was done.
pub async fn bootstrap_admin(repo: &dyn Repository, config: &AppConfig) -> Result<Option<i64>, AppError> {
    let (Some(email), Some(password)) = (&config.seed_admin_email, &config.seed_admin_password) else {
        return Ok(None);
    };

    if !repo.list_users().await?.is_empty() {
        tracing::debug!("accounts already exist, skipping admin bootstrap");
        return Ok(None);
    }

    let profile = NewProfile {
        nome: ADMIN_PROFILE.to_string(),
        permissoes: Module::ALL
            .into_iter()
            .map(|m| (m.key().to_string(), Capabilities::full()))
            .collect(),
    };

    let profile_id = match repo.create_profile(profile).await {
        Ok(id) => id,
        // A previous run may have stopped between the two inserts.
        Err(RepoError::Duplicate(_)) => repo
            .list_profiles()
            .await?
            .into_iter()
            .find(|p| p.nome == ADMIN_PROFILE)
            .map(|p| p.id)
            .ok_or_else(|| RepoError::Validation("perfil administrador ausente".to_string()))?,
        Err(e) => return Err(e.into()),
    };

    let password_hash = hash_password(password).map_err(|e| AppError::Password(e.to_string()))?;
    let user = NewUser {
        nome: ADMIN_PROFILE.to_string(),
        email: email.clone(),
        senha: String::new(),
        perfil_id: profile_id,
        unidade_id: None,
    };
    let user_id = repo.create_user(user, password_hash).await?;

    repo.record_activity(NewActivity::new(Some(user_id), "bootstrap", "administrador criado"))
        .await?;
    tracing::info!(email = %email, "administrator account created");

    Ok(Some(user_id))
}
