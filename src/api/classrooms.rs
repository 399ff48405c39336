//! Classroom management page (admin).

use axum::{
    extract::{Path, State},
    Json,
};

use super::{loaded, submitted, success, ApiResult, SearchRequest};
use crate::forms::Outcome;
use crate::models::ClassroomForm;
use crate::views::ClassroomListState;
use crate::AppState;

/// GET /main/aulas
pub async fn classrooms(State(state): State<AppState>) -> ApiResult<ClassroomListState> {
    let list = &state.views.classrooms;
    let result = match list.refresh().await {
        Ok(()) => Ok(list.snapshot().await),
        Err(e) => Err(e),
    };
    loaded(&state.session, result).await
}

/// POST /main/aulas/more
pub async fn classrooms_more(State(state): State<AppState>) -> ApiResult<ClassroomListState> {
    let list = &state.views.classrooms;
    let result = match list.load_more().await {
        Ok(()) => Ok(list.snapshot().await),
        Err(e) => Err(e),
    };
    loaded(&state.session, result).await
}

/// POST /main/aulas/search
pub async fn search_classrooms(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<ClassroomListState> {
    state.views.search_classrooms(request.term);
    success(&state.session, state.views.classrooms.snapshot().await).await
}

/// POST /main/aulas
pub async fn add_classroom(
    State(state): State<AppState>,
    Json(form): Json<ClassroomForm>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().add_classroom(form).await;
    submitted(&state.session, outcome).await
}

/// PUT /main/aulas/{id}
pub async fn update_classroom(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<ClassroomForm>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().update_classroom(&id, form).await;
    submitted(&state.session, outcome).await
}

/// DELETE /main/aulas/{id}
pub async fn delete_classroom(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().delete_classroom(&id).await;
    submitted(&state.session, outcome).await
}
