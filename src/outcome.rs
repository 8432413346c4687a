use axum::{
    Json,
    extract::{FromRequest, Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use minijinja::{Environment, ErrorKind, Value};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::{RepoError, internal_error_page, not_found_page},
    models::JsonReply,
};

/// Outcome
///
/// What a terminal handler produces. `Render` only names the view: the HTML is produced
/// by the [`render_views`] middleware, which owns the template environment.
#[derive(Debug)]
pub enum Outcome {
    Render { view: String, context: Value },
    Redirect(&'static str),
    Json(StatusCode, serde_json::Value),
}

impl Outcome {
    pub fn render(view: impl Into<String>, context: Value) -> Self {
        Outcome::Render {
            view: view.into(),
            context,
        }
    }

    pub fn json(status: StatusCode, payload: impl Serialize) -> Self {
        match serde_json::to_value(payload) {
            Ok(value) => Outcome::Json(status, value),
            Err(e) => {
                tracing::error!("failed to serialize JSON payload: {:?}", e);
                Outcome::Json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "Erro interno do servidor." }),
                )
            }
        }
    }

    /// `{success:true, message, id}`
    pub fn saved(message: &str, id: i64) -> Self {
        Self::json(
            StatusCode::OK,
            JsonReply {
                success: true,
                message: message.to_string(),
                id: Some(id),
            },
        )
    }

    /// `{success:false, message}`
    pub fn failed(status: StatusCode, message: impl Into<String>) -> Self {
        Self::json(
            status,
            JsonReply {
                success: false,
                message: message.into(),
                id: None,
            },
        )
    }

    /// Maps a persistence failure of a form submission to its JSON reply.
    pub fn save_failed(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate(what) => {
                tracing::info!(constraint = %what, "duplicate record rejected");
                Self::failed(StatusCode::CONFLICT, "Registro já existe.")
            }
            RepoError::Validation(message) => Self::failed(StatusCode::BAD_REQUEST, message),
            RepoError::Database(e) => {
                tracing::error!("failed to save record: {:?}", e);
                Self::failed(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro ao salvar o registro.",
                )
            }
        }
    }
}

/// Marker left in the response extensions by `Outcome::Render`.
#[derive(Debug, Clone)]
pub struct PendingView {
    pub view: String,
    pub context: Value,
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Render { view, context } => {
                let mut response = StatusCode::OK.into_response();
                response
                    .extensions_mut()
                    .insert(PendingView { view, context });
                response
            }
            Outcome::Redirect(path) => Redirect::to(path).into_response(),
            Outcome::Json(status, payload) => (status, Json(payload)).into_response(),
        }
    }
}

const TEMPLATES: &[(&str, &str)] = &[
    ("layout.html", include_str!("../templates/layout.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
    ("module/list.html", include_str!("../templates/module/list.html")),
    ("module/form.html", include_str!("../templates/module/form.html")),
];

fn embedded_template(name: &str) -> Result<Option<String>, minijinja::Error> {
    Ok(TEMPLATES
        .iter()
        .find(|(template, _)| *template == name)
        .map(|(_, source)| source.to_string()))
}

/// Views
///
/// The template environment. Templates are compiled into the binary and parsed lazily on
/// first use.
#[derive(Clone)]
pub struct Views {
    env: Arc<Environment<'static>>,
}

impl Default for Views {
    fn default() -> Self {
        Self::new()
    }
}

impl Views {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_loader(embedded_template);
        Self { env: Arc::new(env) }
    }

    /// Renders a view. An unknown view is a 404, any other template failure a 500.
    pub fn respond(&self, pending: &PendingView) -> Response {
        let template = match self.env.get_template(&pending.view) {
            Ok(template) => template,
            Err(e) if e.kind() == ErrorKind::TemplateNotFound => {
                tracing::warn!(view = %pending.view, "view not found");
                return not_found_page();
            }
            Err(e) => {
                tracing::error!(view = %pending.view, "failed to load view: {:#}", e);
                return internal_error_page();
            }
        };

        match template.render(&pending.context) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
                tracing::error!(view = %pending.view, "failed to render view: {:#}", e);
                internal_error_page()
            }
        }
    }
}

/// render_views
///
/// Turns a `PendingView` marker into the rendered page. Responses without a marker pass
/// through untouched.
pub async fn render_views(State(views): State<Views>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    match response.extensions_mut().remove::<PendingView>() {
        Some(pending) => views.respond(&pending),
        None => response,
    }
}

/// FormJson
///
/// JSON body extractor for form submissions. Both malformed JSON and validation failures
/// are rejected with a `{success:false, message}` reply.
pub struct FormJson<T>(pub T);

impl<S, T> FromRequest<S> for FormJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = Outcome;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| Outcome::failed(StatusCode::BAD_REQUEST, e.body_text()))?;

        value
            .validate()
            .map_err(|e| Outcome::failed(StatusCode::BAD_REQUEST, validation_message(&e)))?;

        Ok(FormJson(value))
    }
}

fn validation_message(errors: &validator::ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Campo inválido: {}", field))
            })
        })
        .collect();
    messages.sort();
    messages.join(" ")
}
