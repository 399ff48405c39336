//! Document paths of the store schema.
//!
//! A document path has an even number of segments (`collection/id/...`),
//! a collection path an odd number.

use crate::errors::AppError;

pub const CLASSROOMS: &str = "classrooms";
pub const INCIDENCES: &str = "incidences";
pub const USERS: &str = "users";

pub fn classroom(id: &str) -> String {
    format!("{CLASSROOMS}/{id}")
}

pub fn devices(classroom_id: &str) -> String {
    format!("{CLASSROOMS}/{classroom_id}/devices")
}

pub fn device(classroom_id: &str, device_id: &str) -> String {
    format!("{}/{device_id}", devices(classroom_id))
}

pub fn incidence(id: &str) -> String {
    format!("{INCIDENCES}/{id}")
}

pub fn incidence_comments(incidence_id: &str) -> String {
    format!("{}/comments", incidence(incidence_id))
}

pub fn user(uid: &str) -> String {
    format!("{USERS}/{uid}")
}

pub fn user_incidences(uid: &str) -> String {
    format!("{}/incidences", user(uid))
}

pub fn user_incidence(uid: &str, id: &str) -> String {
    format!("{}/{id}", user_incidences(uid))
}

pub fn user_incidence_comments(uid: &str, incidence_id: &str) -> String {
    format!("{}/comments", user_incidence(uid, incidence_id))
}

/// Split a document path into its parent collection and document id.
pub fn split_document_path(path: &str) -> Result<(&str, &str), AppError> {
    let segments = segments(path)?;
    if segments % 2 != 0 {
        return Err(AppError::Document(format!(
            "{} is a collection path, expected a document path",
            path
        )));
    }
    // Checked above: at least two non-empty segments.
    let split = path.rfind('/').unwrap_or(0);
    Ok((&path[..split], &path[split + 1..]))
}

/// Validate a collection path.
pub fn check_collection_path(path: &str) -> Result<(), AppError> {
    let segments = segments(path)?;
    if segments % 2 == 0 {
        return Err(AppError::Document(format!(
            "{} is a document path, expected a collection path",
            path
        )));
    }
    Ok(())
}

fn segments(path: &str) -> Result<usize, AppError> {
    if path.is_empty() || path.split('/').any(|segment| segment.is_empty()) {
        return Err(AppError::Document(format!("Invalid document path: '{}'", path)));
    }
    Ok(path.split('/').count())
}
