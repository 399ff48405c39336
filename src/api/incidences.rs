//! Incidence pages: "my incidences" for every user and the management list
//! for TIC users.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{loaded, signed_in_user, submitted, success, ApiResult, SearchRequest};
use crate::errors::AppError;
use crate::forms::{IncidenceDetails, ManageDetails, Outcome};
use crate::models::{Classroom, Device, IncidenceForm, IncidenceStatus, ManageIncidenceForm};
use crate::views::{IncidenceList, IncidenceListState, Segment};
use crate::AppState;

/// Status filter of the list pages; `ALL` clears it.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusParam {
    All,
    Open,
    InProgress,
    Resolved,
}

impl From<StatusParam> for Option<IncidenceStatus> {
    fn from(param: StatusParam) -> Self {
        match param {
            StatusParam::All => None,
            StatusParam::Open => Some(IncidenceStatus::Open),
            StatusParam::InProgress => Some(IncidenceStatus::InProgress),
            StatusParam::Resolved => Some(IncidenceStatus::Resolved),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IncidenceListQuery {
    pub segment: Option<Segment>,
    pub status: Option<StatusParam>,
}

/// Apply the query to `list`, re-subscribe once and refresh the counters.
async fn show(list: &IncidenceList, query: IncidenceListQuery) -> Result<IncidenceListState, AppError> {
    match (query.segment, query.status) {
        (None, None) => list.refresh().await?,
        (segment, status) => {
            if let Some(status) = status {
                list.set_status_filter(status.into()).await?;
            }
            if let Some(segment) = segment {
                list.set_segment(segment).await?;
            }
        }
    }
    list.refresh_summary().await?;
    Ok(list.snapshot().await)
}

/// GET /main/mis-incidencias
pub async fn my_incidences(
    State(state): State<AppState>,
    Query(query): Query<IncidenceListQuery>,
) -> ApiResult<IncidenceListState> {
    let user = signed_in_user(&state).await?;
    let list = state.views.my_incidences(&user.uid).await;
    loaded(&state.session, show(&list, query).await).await
}

/// POST /main/mis-incidencias/more
pub async fn my_incidences_more(State(state): State<AppState>) -> ApiResult<IncidenceListState> {
    let user = signed_in_user(&state).await?;
    let list = state.views.my_incidences(&user.uid).await;
    let result = match list.load_more().await {
        Ok(()) => Ok(list.snapshot().await),
        Err(e) => Err(e),
    };
    loaded(&state.session, result).await
}

/// POST /main/mis-incidencias/search - Debounced; answers before the search
/// settles.
pub async fn search_my_incidences(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<IncidenceListState> {
    let user = signed_in_user(&state).await?;
    state.views.search_my_incidences(&user.uid, request.term).await;
    let list = state.views.my_incidences(&user.uid).await;
    success(&state.session, list.snapshot().await).await
}

/// POST /main/mis-incidencias - Report an incidence.
pub async fn add_incidence(
    State(state): State<AppState>,
    Json(form): Json<IncidenceForm>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().add_incidence(form).await;
    submitted(&state.session, outcome).await
}

/// GET /main/mis-incidencias/detalles/{id}
pub async fn my_incidence_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<IncidenceDetails> {
    let user = signed_in_user(&state).await?;
    let result = state.forms().incidence_details(&user.uid, &id).await;
    loaded(&state.session, result).await
}

/// PUT /main/mis-incidencias/detalles/{id} - Edit an own incidence.
pub async fn update_incidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<IncidenceForm>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().update_incidence(&id, form).await;
    submitted(&state.session, outcome).await
}

/// DELETE /main/mis-incidencias/detalles/{id}
pub async fn delete_own_incidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().delete_own_incidence(&id).await;
    submitted(&state.session, outcome).await
}

/// DELETE /main/incidencias/detalles/{id}
pub async fn delete_incidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().delete_incidence(&id).await;
    submitted(&state.session, outcome).await
}

/// GET /main/incidencias
pub async fn incidences(
    State(state): State<AppState>,
    Query(query): Query<IncidenceListQuery>,
) -> ApiResult<IncidenceListState> {
    let result = show(&state.views.incidences, query).await;
    loaded(&state.session, result).await
}

/// POST /main/incidencias/more
pub async fn incidences_more(State(state): State<AppState>) -> ApiResult<IncidenceListState> {
    let list = &state.views.incidences;
    let result = match list.load_more().await {
        Ok(()) => Ok(list.snapshot().await),
        Err(e) => Err(e),
    };
    loaded(&state.session, result).await
}

/// POST /main/incidencias/search
pub async fn search_incidences(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<IncidenceListState> {
    state.views.search_incidences(request.term);
    success(&state.session, state.views.incidences.snapshot().await).await
}

/// GET /main/incidencias/detalles/{id}
pub async fn manage_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ManageDetails> {
    let result = state.forms().manage_details(&id).await;
    loaded(&state.session, result).await
}

/// PUT /main/incidencias/detalles/{id} - Manage an incidence.
pub async fn manage_incidence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<ManageIncidenceForm>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().manage_incidence(&id, form).await;
    submitted(&state.session, outcome).await
}

/// GET /main/opciones/aulas
pub async fn classroom_options(State(state): State<AppState>) -> ApiResult<Vec<Classroom>> {
    let result = state.forms().classroom_options().await;
    loaded(&state.session, result).await
}

/// GET /main/opciones/aulas/{classroomId}/equipos
pub async fn device_options(
    State(state): State<AppState>,
    Path(classroom_id): Path<String>,
) -> ApiResult<Vec<Device>> {
    let result = state.forms().device_options(&classroom_id).await;
    loaded(&state.session, result).await
}
