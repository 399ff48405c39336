//! Public blob URLs.

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::errors::{ApiError, AppError};
use crate::AppState;

/// GET /storage/v1/object/public/{bucket}/{*path}
///
/// Served with the content type declared when the object was uploaded.
pub async fn public_object(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    if bucket != state.blobs.bucket() {
        return Err(AppError::NotFound(format!("Bucket {} not found", bucket)).into());
    }

    match state.blobs.read(&path).await? {
        Some(bytes) => {
            let content_type = state.blobs.content_type(&path).await?;
            Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
        }
        None => Err(AppError::NotFound(format!("Object {} not found", path)).into()),
    }
}
