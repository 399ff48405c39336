//! Device model.

use serde::{Deserialize, Serialize};

/// Device category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "PC")]
    Pc,
    #[serde(rename = "Portátil")]
    Laptop,
    #[serde(rename = "Proyector")]
    Projector,
    #[serde(rename = "Teclado")]
    Keyboard,
    #[serde(rename = "Ratón")]
    Mouse,
    #[serde(rename = "Otro")]
    Other,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Pc => "PC",
            DeviceType::Laptop => "Portátil",
            DeviceType::Projector => "Proyector",
            DeviceType::Keyboard => "Teclado",
            DeviceType::Mouse => "Ratón",
            DeviceType::Other => "Otro",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Working,
    OutOfService,
}

impl DeviceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceStatus::Working => "Funciona",
            DeviceStatus::OutOfService => "Fuera de servicio",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            DeviceStatus::Working => "#10b981",
            DeviceStatus::OutOfService => "#ef4444",
        }
    }
}

/// A device, nested under its classroom at `classrooms/{classroomId}/devices/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub image: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    pub serial_number: String,
    pub brand: String,
    #[serde(rename = "classroomId")]
    pub classroom_id: String,
}

/// Request body for creating or updating a device.
///
/// `image` is either the current public URL (unchanged) or a data URL.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceForm {
    #[serde(default)]
    pub image: String,
    #[serde(rename = "type")]
    pub device_type: Option<DeviceType>,
    pub status: Option<DeviceStatus>,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub brand: String,
    #[serde(rename = "classroomId", default)]
    pub classroom_id: String,
}
