//! REST API module.
//!
//! Mirrors the navigation surface of the app: every page route answers with
//! the page's current state, and form submissions answer with the
//! [`Outcome`] plus the toasts they raised.

mod blobs;
mod classrooms;
mod devices;
mod incidences;
mod session;
mod users;

pub use blobs::*;
pub use classrooms::*;
pub use devices::*;
pub use incidences::*;
pub use session::*;
pub use users::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::{ApiError, AppError};
use crate::forms::Outcome;
use crate::models::User;
use crate::session::{Session, Toast};
use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub toasts: Vec<Toast>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, toasts: Vec<Toast>) -> Self {
        Self {
            success: true,
            data,
            toasts,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Body of the search endpoints.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub term: String,
}

/// Reply with `data` and the pending toasts.
pub async fn success<T: Serialize>(session: &Session, data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data, session.drain_toasts().await))
}

/// Reply with `error` and the pending toasts.
pub async fn failure<T: Serialize>(session: &Session, error: AppError) -> ApiResult<T> {
    Err(ApiError {
        error,
        toasts: session.drain_toasts().await,
    })
}

/// Reply to a form submission.
pub async fn submitted(session: &Session, mut outcome: Outcome) -> ApiResult<Outcome> {
    match outcome.error.take() {
        None if outcome.success => success(session, outcome).await,
        None => failure(session, AppError::Internal("Submission failed".to_string())).await,
        Some(error) => failure(session, error).await,
    }
}

/// Reply with a read result, raising an error toast on failure.
pub async fn loaded<T: Serialize>(session: &Session, result: Result<T, AppError>) -> ApiResult<T> {
    match result {
        Ok(data) => success(session, data).await,
        Err(e) => {
            tracing::error!("Error loading page data: {}", e);
            session.present_toast(Toast::error(e.message())).await;
            failure(session, e).await
        }
    }
}

/// The stored user; the auth guard has already checked it is present.
async fn signed_in_user(state: &AppState) -> Result<User, AppError> {
    state
        .session
        .current_user()
        .await
        .ok_or_else(|| AppError::Authentication("No user signed in".to_string()))
}
