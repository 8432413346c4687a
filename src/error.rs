//! Error types shared by the repository and the handlers.
//!
//! Page routes turn any [`AppError`] into a generic 500 page; form routes turn a
//! [`RepoError`] into a `{success:false, message}` reply (see `outcome.rs`).

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

/// Persistence failures, classified the way the handlers report them.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A unique constraint was violated. Carries the constraint (or record) name.
    #[error("{0} already exists")]
    Duplicate(String),

    /// The payload cannot be stored as given.
    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("registro").to_string();
                return RepoError::Duplicate(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return RepoError::Validation("Registro relacionado não encontrado.".to_string());
            }
        }
        RepoError::Database(err)
    }
}

/// Failures of page handlers. All of them end as a generic 500 page; the cause is logged.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("password hashing error: {0}")]
    Password(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed");
        internal_error_page()
    }
}

pub fn internal_error_page() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html("<h1>500</h1><p>Erro interno do servidor.</p>"),
    )
        .into_response()
}

pub fn not_found_page() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html("<h1>404</h1><p>Página não encontrada.</p>"),
    )
        .into_response()
}
