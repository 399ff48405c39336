//! Incidence and comment models.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidenceStatus {
    Open,
    InProgress,
    Resolved,
}

impl IncidenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidenceStatus::Open => "OPEN",
            IncidenceStatus::InProgress => "IN_PROGRESS",
            IncidenceStatus::Resolved => "RESOLVED",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IncidenceStatus::Open => "Abierta",
            IncidenceStatus::InProgress => "En revisión",
            IncidenceStatus::Resolved => "Resuelta",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            IncidenceStatus::Open => "#ef4444",
            IncidenceStatus::InProgress => "#ff9800",
            IncidenceStatus::Resolved => "#10b981",
        }
    }
}

/// An incidence report.
///
/// Stored twice: the owner copy at `users/{uid}/incidences/{id}` and the
/// global copy at `incidences/{id}`, which additionally carries `userId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incidence {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: IncidenceStatus,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
    pub image: String,
    pub classroom_id: String,
    pub device_id: String,
    pub reported_by_user_id: String,
    #[serde(default)]
    pub diagnose: String,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Request body for creating an incidence or editing one as its owner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidenceForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub classroom_id: String,
    #[serde(default)]
    pub device_id: String,
}

/// Request body of the TIC management form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageIncidenceForm {
    pub status: Option<IncidenceStatus>,
    #[serde(default)]
    pub diagnose: String,
    #[serde(default)]
    pub comment: String,
}

/// A comment on an incidence, dual-stored like its incidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_incidence_wire_format() {
        let incidence: Incidence = serde_json::from_value(json!({
            "id": "i1",
            "title": "Proyector roto",
            "description": "No enciende desde el lunes",
            "status": "IN_PROGRESS",
            "createdAt": 1_700_000_000_000_i64,
            "image": "",
            "classroomId": "c1",
            "deviceId": "d1",
            "reportedByUserId": "u1",
            "isClosed": false
        }))
        .unwrap();
        assert_eq!(incidence.status, IncidenceStatus::InProgress);
        assert_eq!(incidence.diagnose, "");
        assert!(incidence.user_id.is_none());

        let json = serde_json::to_value(&incidence).unwrap();
        assert_eq!(json["reportedByUserId"], "u1");
        assert_eq!(json["status"], "IN_PROGRESS");
        assert!(json.get("userId").is_none());
    }

    #[test]
    fn test_status_presentation() {
        assert_eq!(IncidenceStatus::Open.label(), "Abierta");
        assert_eq!(IncidenceStatus::Resolved.color(), "#10b981");
    }
}
