use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::{Session, cookie::Key};

use crate::{gate::LOGIN_PATH, permissions::PermissionMap};

/// Session keys. The identity and the permission snapshot are only ever written together,
/// by the login handler.
pub const USER_KEY: &str = "user";
pub const PERMISSIONS_KEY: &str = "permissions";
/// One-shot message displayed (and consumed) by the login page.
pub const MESSAGE_KEY: &str = "message";

/// Name of the session cookie. Its value is an opaque, signed session id.
pub const SESSION_COOKIE: &str = "raven.sid";

/// SessionUser
///
/// The authenticated identity held in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// SessionContext
///
/// Everything the gates need to decide on a request: the identity (if any) and the
/// permission snapshot taken at login.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub user: Option<SessionUser>,
    pub permissions: PermissionMap,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: SessionUser, permissions: PermissionMap) -> Self {
        Self {
            user: Some(user),
            permissions,
        }
    }

    /// Reads the context out of the session store. A store failure is logged and treated
    /// as an anonymous session, so the request ends in a redirect rather than an error.
    pub async fn load(session: &Session) -> Self {
        let user = match session.get::<SessionUser>(USER_KEY).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!("failed to read session identity: {:?}", e);
                return Self::anonymous();
            }
        };
        let Some(user) = user else {
            return Self::anonymous();
        };
        let permissions = session
            .get::<PermissionMap>(PERMISSIONS_KEY)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("failed to read session permissions: {:?}", e);
                None
            })
            .unwrap_or_default();
        Self::authenticated(user, permissions)
    }
}

/// Writes a fresh identity and its permission snapshot. The session id is cycled first so
/// a pre-login cookie never becomes an authenticated one.
pub async fn establish(
    session: &Session,
    user: &SessionUser,
    permissions: &PermissionMap,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.remove::<String>(MESSAGE_KEY).await?;
    session.insert(USER_KEY, user).await?;
    session.insert(PERMISSIONS_KEY, permissions).await?;
    Ok(())
}

/// CurrentUser Extractor Result
///
/// The resolved identity of a gated request, together with its permission snapshot.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: SessionUser,
    pub permissions: PermissionMap,
}

/// CurrentUser Extractor Implementation
///
/// The gate middleware leaves a `CurrentUser` in the request extensions; handlers mounted
/// without a gate fall back to reading the session. Rejection is a redirect to the login
/// page, never an error status.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<CurrentUser>() {
            return Ok(current.clone());
        }

        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| Redirect::to(LOGIN_PATH))?;

        match SessionContext::load(&session).await {
            SessionContext {
                user: Some(user),
                permissions,
            } => Ok(CurrentUser { user, permissions }),
            _ => Err(Redirect::to(LOGIN_PATH)),
        }
    }
}

/// Derives the cookie signing key from the configured secret. `Key` needs at least 64
/// bytes, so shorter secrets are repeated.
pub fn signing_key(secret: &str) -> Key {
    let seed = if secret.is_empty() { SESSION_COOKIE } else { secret };
    let material: Vec<u8> = seed.bytes().cycle().take(seed.len().max(64)).collect();
    Key::from(material.as_slice())
}

/// Hashes a password into an Argon2 PHC string.
pub fn hash_password(plain: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(plain.as_bytes(), &salt)?
        .to_string())
}

/// Checks a password against a stored PHC string. A malformed hash never matches.
pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("stored password hash is malformed: {:?}", e);
            false
        }
    }
}
