//! Privileged user creation (admin).

use axum::{extract::State, Json};

use super::{submitted, ApiResult};
use crate::forms::Outcome;
use crate::models::CreatePrivilegedUserRequest;
use crate::AppState;

/// POST /main/create-privileged-user
pub async fn create_privileged_user(
    State(state): State<AppState>,
    Json(request): Json<CreatePrivilegedUserRequest>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().create_privileged_user(request).await;
    submitted(&state.session, outcome).await
}
