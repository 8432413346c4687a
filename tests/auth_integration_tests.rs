use axum::{
    extract::FromRequestParts,
    http::{Request, StatusCode},
    response::IntoResponse,
};
use raven_admin::{
    auth::{self, CurrentUser, MESSAGE_KEY, SessionContext, SessionUser},
    permissions::{Action, Capabilities, PermissionMap},
};
use std::sync::Arc;
use tower_sessions::{MemoryStore, Session};

// --- Test Data Helpers ---

fn fresh_session() -> Session {
    Session::new(None, Arc::new(MemoryStore::default()), None)
}

fn operator() -> SessionUser {
    SessionUser {
        id: 42,
        name: "Operadora".to_string(),
        email: "operadora@raven.local".to_string(),
    }
}

fn ppe_viewer() -> PermissionMap {
    [("epi", Capabilities::only(&[Action::View]))]
        .into_iter()
        .collect()
}

// --- Password Hashing ---

#[test]
fn test_password_hash_round_trip() {
    let hash = auth::hash_password("s3nh4-segura").unwrap();

    assert!(hash.starts_with("$argon2"));
    assert!(auth::verify_password("s3nh4-segura", &hash));
    assert!(!auth::verify_password("s3nh4-errada", &hash));
}

#[test]
fn test_same_password_gets_distinct_salts() {
    let first = auth::hash_password("repetida").unwrap();
    let second = auth::hash_password("repetida").unwrap();
    assert_ne!(first, second);
}

#[test]
fn test_malformed_hash_never_matches() {
    assert!(!auth::verify_password("qualquer", "not-a-phc-string"));
    assert!(!auth::verify_password("", ""));
}

#[test]
fn test_signing_key_accepts_short_and_empty_secrets() {
    // Key::from panics below 64 bytes, so both calls prove the padding.
    let short = auth::signing_key("curto");
    let empty = auth::signing_key("");
    assert_ne!(short.master(), empty.master());
    assert_eq!(auth::signing_key("curto").master(), short.master());
}

// --- Session Context ---

#[tokio::test]
async fn test_empty_session_is_anonymous() {
    let session = fresh_session();
    let ctx = SessionContext::load(&session).await;

    assert!(ctx.user.is_none());
    assert!(ctx.permissions.is_empty());
}

#[tokio::test]
async fn test_establish_stores_identity_and_snapshot() {
    let session = fresh_session();
    session.insert(MESSAGE_KEY, "E-mail ou senha inválidos.").await.unwrap();

    auth::establish(&session, &operator(), &ppe_viewer())
        .await
        .unwrap();
    let ctx = SessionContext::load(&session).await;

    assert_eq!(ctx.user, Some(operator()));
    assert!(ctx.permissions.allows("epi", Action::View));
    assert!(!ctx.permissions.allows("epi", Action::Create));
    // A stale login message does not survive a successful login.
    assert_eq!(session.get::<String>(MESSAGE_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn test_flushed_session_is_anonymous_again() {
    let session = fresh_session();
    auth::establish(&session, &operator(), &ppe_viewer())
        .await
        .unwrap();

    session.flush().await.unwrap();

    assert!(SessionContext::load(&session).await.user.is_none());
}

// --- CurrentUser Extractor ---

#[tokio::test]
async fn test_current_user_comes_from_gate_extension() {
    let mut request = Request::builder().uri("/epi").body(()).unwrap();
    request.extensions_mut().insert(CurrentUser {
        user: operator(),
        permissions: ppe_viewer(),
    });
    let (mut parts, _) = request.into_parts();

    let current = CurrentUser::from_request_parts(&mut parts, &())
        .await
        .expect("extension should satisfy the extractor");
    assert_eq!(current.user.id, 42);
}

#[tokio::test]
async fn test_current_user_from_session_extension() {
    let session = fresh_session();
    auth::establish(&session, &operator(), &ppe_viewer())
        .await
        .unwrap();

    let mut request = Request::builder().uri("/dashboard").body(()).unwrap();
    request.extensions_mut().insert(session);
    let (mut parts, _) = request.into_parts();

    let current = CurrentUser::from_request_parts(&mut parts, &())
        .await
        .expect("an authenticated session should satisfy the extractor");
    assert_eq!(current.user.email, "operadora@raven.local");
}

#[tokio::test]
async fn test_missing_identity_rejects_with_login_redirect() {
    let mut request = Request::builder().uri("/dashboard").body(()).unwrap();
    request.extensions_mut().insert(fresh_session());
    let (mut parts, _) = request.into_parts();

    let rejection = CurrentUser::from_request_parts(&mut parts, &())
        .await
        .err()
        .expect("anonymous session should be rejected");
    let response = rejection.into_response();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["location"], "/login");
}
