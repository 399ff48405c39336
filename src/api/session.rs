//! Authentication pages, the main shell and sign-out.

use axum::{extract::State, Json};
use serde::Serialize;

use super::{signed_in_user, submitted, success, ApiResult};
use crate::forms::Outcome;
use crate::models::{RecoveryRequest, SignInRequest, SignUpRequest, User};
use crate::session::{menu_pages, MenuPage};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PageInfo {
    pub page: &'static str,
}

/// The main shell: the stored user and the menu entries.
#[derive(Debug, Serialize)]
pub struct Shell {
    pub user: User,
    pub pages: Vec<MenuPage>,
}

#[derive(Debug, Serialize)]
pub struct SignedOut {
    pub redirect: String,
}

/// GET /auth
pub async fn auth_page(State(state): State<AppState>) -> ApiResult<PageInfo> {
    success(&state.session, PageInfo { page: "auth" }).await
}

/// GET /sign-up
pub async fn sign_up_page(State(state): State<AppState>) -> ApiResult<PageInfo> {
    success(&state.session, PageInfo { page: "sign-up" }).await
}

/// GET /forgot-password
pub async fn forgot_password_page(State(state): State<AppState>) -> ApiResult<PageInfo> {
    success(&state.session, PageInfo { page: "forgot-password" }).await
}

/// POST /auth - Sign in.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().sign_in(request).await;
    submitted(&state.session, outcome).await
}

/// POST /sign-up - Register and sign in.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().sign_up(request).await;
    submitted(&state.session, outcome).await
}

/// POST /forgot-password - Request a recovery email.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<RecoveryRequest>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().send_recovery(request).await;
    submitted(&state.session, outcome).await
}

/// GET /main
pub async fn shell(State(state): State<AppState>) -> ApiResult<Shell> {
    let user = signed_in_user(&state).await?;
    let pages = menu_pages(&user);
    success(&state.session, Shell { user, pages }).await
}

/// POST /main/sign-out
pub async fn sign_out(State(state): State<AppState>) -> ApiResult<SignedOut> {
    state.views.close_all().await;
    let redirect = state.forms().sign_out().await?;
    success(&state.session, SignedOut { redirect }).await
}
