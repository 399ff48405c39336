//! Device inventory page and device details (admin).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{loaded, submitted, success, ApiResult, SearchRequest};
use crate::errors::AppError;
use crate::forms::{DeviceDetails, Outcome};
use crate::models::{DeviceForm, DeviceStatus};
use crate::views::{DeviceList, DeviceListState, DeviceOrder};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryQuery {
    pub classroom_id: Option<String>,
    pub status: Option<DeviceStatus>,
    pub order_by: Option<DeviceOrder>,
}

async fn show(list: &DeviceList, query: InventoryQuery) -> Result<DeviceListState, AppError> {
    list.load_classrooms().await?;
    if let Some(classroom_id) = query.classroom_id {
        list.select_classroom(classroom_id).await?;
    }
    if query.status.is_some() {
        list.set_status_filter(query.status).await?;
    }
    if query.order_by.is_some() {
        list.set_order(query.order_by).await?;
    }
    Ok(list.snapshot().await)
}

/// GET /main/inventario
pub async fn inventory(
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> ApiResult<DeviceListState> {
    let result = show(&state.views.devices, query).await;
    loaded(&state.session, result).await
}

/// POST /main/inventario/more
pub async fn inventory_more(State(state): State<AppState>) -> ApiResult<DeviceListState> {
    let list = &state.views.devices;
    let result = match list.load_more().await {
        Ok(()) => Ok(list.snapshot().await),
        Err(e) => Err(e),
    };
    loaded(&state.session, result).await
}

/// POST /main/inventario/search
pub async fn search_devices(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<DeviceListState> {
    state.views.search_devices(request.term);
    success(&state.session, state.views.devices.snapshot().await).await
}

/// POST /main/inventario
pub async fn add_device(
    State(state): State<AppState>,
    Json(form): Json<DeviceForm>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().add_device(form).await;
    submitted(&state.session, outcome).await
}

/// GET /main/inventario/detalles/{classroomId}/{deviceId}
pub async fn device_details(
    State(state): State<AppState>,
    Path((classroom_id, device_id)): Path<(String, String)>,
) -> ApiResult<DeviceDetails> {
    let result = state.forms().device_details(&classroom_id, &device_id).await;
    loaded(&state.session, result).await
}

/// PUT /main/inventario/detalles/{classroomId}/{deviceId}
pub async fn update_device(
    State(state): State<AppState>,
    Path((classroom_id, device_id)): Path<(String, String)>,
    Json(form): Json<DeviceForm>,
) -> ApiResult<Outcome> {
    let outcome = state
        .forms()
        .update_device(&classroom_id, &device_id, form)
        .await;
    submitted(&state.session, outcome).await
}

/// DELETE /main/inventario/detalles/{classroomId}/{deviceId}
pub async fn delete_device(
    State(state): State<AppState>,
    Path((classroom_id, device_id)): Path<(String, String)>,
) -> ApiResult<Outcome> {
    let outcome = state.forms().delete_device(&classroom_id, &device_id).await;
    submitted(&state.session, outcome).await
}
