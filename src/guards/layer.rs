//! Guards as axum middleware over [`AppState`].

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::{admin_role_guard, auth_guard, no_auth_guard, tic_role_guard, GuardOutcome};
use crate::session::url_tree;
use crate::AppState;

async fn resolve(outcome: GuardOutcome, request: Request, next: Next) -> Response {
    match outcome {
        GuardOutcome::Allow => next.run(request).await,
        GuardOutcome::Redirect(route) => {
            tracing::debug!(path = %request.uri().path(), %route, "Guard redirect");
            url_tree(&route).into_response()
        }
    }
}

pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let outcome = auth_guard(&state.auth, &state.session).await;
    resolve(outcome, request, next).await
}

pub async fn require_no_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let outcome = no_auth_guard(&state.auth, &state.session).await;
    resolve(outcome, request, next).await
}

pub async fn require_tic_role(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = state.session.current_user().await;
    resolve(tic_role_guard(user.as_ref()), request, next).await
}

pub async fn require_admin_role(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let user = state.session.current_user().await;
    resolve(admin_role_guard(user.as_ref()), request, next).await
}
