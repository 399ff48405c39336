//! Classroom model.

use serde::{Deserialize, Serialize};

/// A classroom, stored at `classrooms/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classroom {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub location: String,
}

/// Request body for creating or updating a classroom.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassroomForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
}
