//! Read-only detail views and the option lists of the form selects.

use serde::Serialize;

use super::Forms;
use crate::errors::AppError;
use crate::models::{Classroom, Comment, Device, Incidence, ManageIncidenceForm};
use crate::store::{paths, Direction, QueryOptions};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidenceDetails {
    pub incidence: Incidence,
    pub status_label: &'static str,
    pub status_color: &'static str,
    pub classroom: Option<Classroom>,
    pub device: Option<Device>,
    pub comments: Vec<Comment>,
}

/// Incidence details with the management form prefilled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageDetails {
    #[serde(flatten)]
    pub details: IncidenceDetails,
    pub form: ManageIncidenceForm,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDetails {
    pub device: Device,
    pub status_label: &'static str,
    pub status_color: &'static str,
    pub classroom: Option<Classroom>,
}

impl Forms {
    /// Owner copy of incidence `id` reported by `uid`.
    pub async fn incidence_details(&self, uid: &str, id: &str) -> Result<IncidenceDetails, AppError> {
        let incidence: Incidence = self
            .store
            .get_as(&paths::user_incidence(uid, id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incidence {} not found", id)))?;
        let comments = self
            .comments(&paths::user_incidence_comments(uid, id))
            .await?;
        self.describe(incidence, comments).await
    }

    /// Global copy of incidence `id` with its comments and the management
    /// form.
    pub async fn manage_details(&self, id: &str) -> Result<ManageDetails, AppError> {
        let form = self.prepare_manage(id).await?;
        let incidence: Incidence = self
            .store
            .get_as(&paths::incidence(id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incidence {} not found", id)))?;
        let comments = self.comments(&paths::incidence_comments(id)).await?;
        Ok(ManageDetails {
            details: self.describe(incidence, comments).await?,
            form,
        })
    }

    pub async fn device_details(
        &self,
        classroom_id: &str,
        device_id: &str,
    ) -> Result<DeviceDetails, AppError> {
        let device: Device = self
            .store
            .get_as(&paths::device(classroom_id, device_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", device_id)))?;
        let classroom = self.store.get_as(&paths::classroom(classroom_id)).await?;
        Ok(DeviceDetails {
            status_label: device.status.label(),
            status_color: device.status.color(),
            device,
            classroom,
        })
    }

    /// Classrooms offered by the incidence and device forms.
    pub async fn classroom_options(&self) -> Result<Vec<Classroom>, AppError> {
        let by_name = QueryOptions::new().order_by("name", Direction::Asc);
        self.store.list_as(paths::CLASSROOMS, &by_name).await
    }

    /// Devices of the chosen classroom.
    pub async fn device_options(&self, classroom_id: &str) -> Result<Vec<Device>, AppError> {
        self.store
            .list_as(&paths::devices(classroom_id), &QueryOptions::new())
            .await
    }

    async fn comments(&self, collection: &str) -> Result<Vec<Comment>, AppError> {
        let by_date = QueryOptions::new().order_by("createdAt", Direction::Asc);
        self.store.list_as(collection, &by_date).await
    }

    async fn describe(
        &self,
        incidence: Incidence,
        comments: Vec<Comment>,
    ) -> Result<IncidenceDetails, AppError> {
        let classroom = self
            .store
            .get_as(&paths::classroom(&incidence.classroom_id))
            .await?;
        let device = self
            .store
            .get_as(&paths::device(&incidence.classroom_id, &incidence.device_id))
            .await?;
        Ok(IncidenceDetails {
            status_label: incidence.status.label(),
            status_color: incidence.status.color(),
            incidence,
            classroom,
            device,
            comments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::models::{DeviceForm, DeviceStatus, DeviceType, IncidenceForm, IncidenceStatus};
    use serde_json::json;

    #[tokio::test]
    async fn test_incidence_details_join_classroom_and_device() {
        let fx = fixture().await;
        signed_in(&fx, "u1", false, true).await;
        fx.store
            .set(&paths::classroom("c1"), json!({"name": "Aula 101", "location": "Planta baja"}))
            .await
            .unwrap();
        let device_id = fx
            .forms
            .add_device(DeviceForm {
                image: PIXEL.to_string(),
                device_type: Some(DeviceType::Pc),
                status: Some(DeviceStatus::OutOfService),
                serial_number: "SN-12345".to_string(),
                brand: "Dell".to_string(),
                classroom_id: "c1".to_string(),
            })
            .await
            .id
            .unwrap();
        let id = fx
            .forms
            .add_incidence(IncidenceForm {
                title: "PC no arranca".to_string(),
                description: "Pantalla negra al encender".to_string(),
                image: PIXEL.to_string(),
                classroom_id: "c1".to_string(),
                device_id: device_id.clone(),
            })
            .await
            .id
            .unwrap();

        let details = fx.forms.incidence_details("u1", &id).await.unwrap();
        assert_eq!(details.status_label, "Abierta");
        assert_eq!(details.classroom.unwrap().name, "Aula 101");
        assert_eq!(details.device.unwrap().id, device_id);
        assert!(details.comments.is_empty());

        let manage = fx.forms.manage_details(&id).await.unwrap();
        assert_eq!(manage.form.status, Some(IncidenceStatus::InProgress));
        assert_eq!(manage.details.incidence.user_id.as_deref(), Some("u1"));

        let device = fx.forms.device_details("c1", &device_id).await.unwrap();
        assert_eq!(device.status_label, "Fuera de servicio");
        assert_eq!(fx.forms.device_options("c1").await.unwrap().len(), 1);
        assert_eq!(fx.forms.classroom_options().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_incidence_is_not_found() {
        let fx = fixture().await;
        let err = fx.forms.incidence_details("u1", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
