//! Request gates.
//!
//! A gate is a pure predicate over the [`SessionContext`]: it either lets the request
//! through or names the redirect that replaces it. Each route carries an explicit,
//! ordered [`GateChain`] evaluated short-circuit ahead of its terminal handler.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tower_sessions::Session;

use crate::{
    auth::{CurrentUser, SessionContext},
    catalog::Module,
    permissions::Action,
};

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// GuardOutcome
///
/// The transient decision of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    RedirectToLogin,
    RedirectToDashboard,
}

impl GuardOutcome {
    pub fn redirect_path(&self) -> Option<&'static str> {
        match self {
            GuardOutcome::Allow => None,
            GuardOutcome::RedirectToLogin => Some(LOGIN_PATH),
            GuardOutcome::RedirectToDashboard => Some(DASHBOARD_PATH),
        }
    }
}

/// Authentication gate: allows any session carrying an identity.
pub fn authenticate(ctx: &SessionContext) -> GuardOutcome {
    match ctx.user {
        Some(_) => GuardOutcome::Allow,
        None => GuardOutcome::RedirectToLogin,
    }
}

/// Permission gate over the login-time snapshot. Never touches the database.
///
/// A missing module or an ungranted action sends the user back to the dashboard and
/// leaves an audit line naming who tried what.
pub fn authorize(ctx: &SessionContext, module: &str, action: Action) -> GuardOutcome {
    let Some(user) = &ctx.user else {
        return GuardOutcome::RedirectToLogin;
    };

    if ctx.permissions.allows(module, action) {
        return GuardOutcome::Allow;
    }

    tracing::warn!(
        user_id = user.id,
        email = %user.email,
        module,
        action = %action,
        "permission denied"
    );
    GuardOutcome::RedirectToDashboard
}

/// Gate
///
/// One step of a route's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Authenticated,
    Permission(Module, Action),
}

impl Gate {
    pub fn check(&self, ctx: &SessionContext) -> GuardOutcome {
        match self {
            Gate::Authenticated => authenticate(ctx),
            Gate::Permission(module, action) => authorize(ctx, module.key(), *action),
        }
    }
}

/// GateChain
///
/// Ordered gates of one route. Cheap to clone; used as the state of the [`enforce`]
/// middleware.
#[derive(Debug, Clone)]
pub struct GateChain(Arc<[Gate]>);

impl GateChain {
    pub fn new(gates: impl Into<Vec<Gate>>) -> Self {
        let gates: Vec<Gate> = gates.into();
        Self(gates.into())
    }

    /// `[Authenticated]`
    pub fn authenticated() -> Self {
        Self::new([Gate::Authenticated])
    }

    /// `[Authenticated, Permission(module, action)]`
    pub fn permission(module: Module, action: Action) -> Self {
        Self::new([Gate::Authenticated, Gate::Permission(module, action)])
    }

    /// Runs the gates in order and stops at the first one that does not allow.
    pub fn evaluate(&self, ctx: &SessionContext) -> GuardOutcome {
        self.0
            .iter()
            .map(|gate| gate.check(ctx))
            .find(|outcome| *outcome != GuardOutcome::Allow)
            .unwrap_or(GuardOutcome::Allow)
    }
}

/// enforce
///
/// Middleware adapter for a [`GateChain`]. On `Allow` the resolved [`CurrentUser`] is
/// placed in the request extensions for the terminal handler.
pub async fn enforce(
    State(chain): State<GateChain>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let ctx = SessionContext::load(&session).await;

    match chain.evaluate(&ctx).redirect_path() {
        Some(path) => Redirect::to(path).into_response(),
        None => {
            if let SessionContext {
                user: Some(user),
                permissions,
            } = ctx
            {
                request
                    .extensions_mut()
                    .insert(CurrentUser { user, permissions });
            }
            next.run(request).await
        }
    }
}
