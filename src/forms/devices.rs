//! Device add, edit (including moves between classrooms) and delete.

use super::{Completed, FormPhase, FormRun, Forms, Outcome, Validator};
use crate::errors::AppError;
use crate::models::{Device, DeviceForm};
use crate::session::Toast;
use crate::store::{paths, WriteBatch};

fn validate(form: &DeviceForm) -> Result<(), AppError> {
    Validator::new()
        .required("image", &form.image)
        .present("type", &form.device_type)
        .present("status", &form.status)
        .length("serial_number", &form.serial_number, 5, 500)
        .length("brand", &form.brand, 2, 500)
        .required("classroomId", &form.classroom_id)
        .finish()
}

/// The stored document for a validated form.
fn device_document(form: DeviceForm, image: String) -> Result<serde_json::Value, AppError> {
    let device = Device {
        id: String::new(),
        image,
        device_type: form
            .device_type
            .ok_or_else(|| AppError::Validation("type: campo obligatorio".to_string()))?,
        status: form
            .status
            .ok_or_else(|| AppError::Validation("status: campo obligatorio".to_string()))?,
        serial_number: form.serial_number,
        brand: form.brand,
        classroom_id: form.classroom_id,
    };
    Ok(serde_json::to_value(device)?)
}

impl Forms {
    pub async fn add_device(&self, form: DeviceForm) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("add-device");
        let result = self.try_add_device(&mut run, form).await;
        self.conclude(run, result).await
    }

    /// Save the device found at `classroomId`/`device_id`.
    ///
    /// When the form names another classroom the device moves there and
    /// keeps its identifier.
    pub async fn update_device(
        &self,
        classroom_id: &str,
        device_id: &str,
        form: DeviceForm,
    ) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("update-device");
        let result = self
            .try_update_device(&mut run, classroom_id, device_id, form)
            .await;
        self.conclude(run, result).await
    }

    pub async fn delete_device(&self, classroom_id: &str, device_id: &str) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("delete-device");
        run.enter(FormPhase::Persisting);
        let result = self
            .store
            .delete(&paths::device(classroom_id, device_id))
            .await
            .map(|()| {
                Completed::new(Toast::success("Dispositivo borrado exitosamente")).with_id(device_id)
            });
        self.conclude(run, result).await
    }

    async fn try_add_device(&self, run: &mut FormRun, form: DeviceForm) -> Result<Completed, AppError> {
        let user = self.current_user().await?;

        run.enter(FormPhase::Validating);
        validate(&form)?;

        run.enter(FormPhase::ImageUploading);
        let image = self.upload_image(&user.uid, &form.image).await?;

        run.enter(FormPhase::Persisting);
        let collection = paths::devices(&form.classroom_id);
        let id = self.store.add(&collection, device_document(form, image)?).await?;
        Ok(Completed::new(Toast::success("Equipo añadido exitosamente")).with_id(id))
    }

    async fn try_update_device(
        &self,
        run: &mut FormRun,
        classroom_id: &str,
        device_id: &str,
        form: DeviceForm,
    ) -> Result<Completed, AppError> {
        let user = self.current_user().await?;

        run.enter(FormPhase::Validating);
        validate(&form)?;

        let current_path = paths::device(classroom_id, device_id);
        let current: Device = self
            .store
            .get_as(&current_path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Device {} not found", device_id)))?;

        let image = self
            .replace_image(run, &user.uid, &current.image, &form.image)
            .await?;

        run.enter(FormPhase::Persisting);
        let target_classroom = form.classroom_id.clone();
        let data = device_document(form, image)?;
        if target_classroom == classroom_id {
            self.store.update(&current_path, data).await?;
        } else {
            tracing::info!(
                device_id,
                from = classroom_id,
                to = %target_classroom,
                "Moving device"
            );
            let batch = WriteBatch::new()
                .delete(current_path)
                .set(paths::device(&target_classroom, device_id), data);
            self.store.commit(batch).await?;
        }
        Ok(Completed::new(Toast::success("Equipo actualizado exitosamente")).with_id(device_id))
    }
}
