//! Incidence report, owner edit, TIC management and deletion.
//!
//! Every write touches the owner copy (`users/{uid}/incidences/{id}`) and
//! the global copy (`incidences/{id}`) in one batch.

use chrono::Utc;
use serde_json::json;

use super::{Completed, FormPhase, FormRun, Forms, Outcome, Validator};
use crate::errors::AppError;
use crate::models::{Incidence, IncidenceForm, IncidenceStatus, ManageIncidenceForm};
use crate::session::Toast;
use crate::store::{paths, WriteBatch};

fn validate(form: &IncidenceForm, reporter: &str) -> Result<(), AppError> {
    Validator::new()
        .length("title", &form.title, 3, 100)
        .length("description", &form.description, 10, 1000)
        .required("image", &form.image)
        .required("classroomId", &form.classroom_id)
        .required("deviceId", &form.device_id)
        .required("reportedByUserId", reporter)
        .finish()
}

fn validate_manage(form: &ManageIncidenceForm) -> Result<(), AppError> {
    Validator::new()
        .present("status", &form.status)
        .optional_length("diagnose", form.diagnose.trim(), 5, 500)
        .optional_length("comment", form.comment.trim(), 5, 500)
        .finish()
}

/// Status and closed flag after a management submission.
///
/// A diagnose resolves the incidence; an incidence is closed iff resolved.
pub fn managed_status(form: &ManageIncidenceForm) -> Option<(IncidenceStatus, bool)> {
    let status = if form.diagnose.trim().is_empty() {
        form.status?
    } else {
        IncidenceStatus::Resolved
    };
    Some((status, status == IncidenceStatus::Resolved))
}

impl Forms {
    pub async fn add_incidence(&self, form: IncidenceForm) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("add-incidence");
        let result = self.try_add_incidence(&mut run, form).await;
        self.conclude(run, result).await
    }

    /// Edit an incidence reported by the signed-in user.
    pub async fn update_incidence(&self, id: &str, form: IncidenceForm) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("update-incidence");
        let result = self.try_update_incidence(&mut run, id, form).await;
        self.conclude(run, result).await
    }

    /// Initial state of the management form: `IN_PROGRESS` with the stored
    /// diagnose.
    pub async fn prepare_manage(&self, id: &str) -> Result<ManageIncidenceForm, AppError> {
        let incidence = self.global_incidence(id).await?;
        Ok(ManageIncidenceForm {
            status: Some(IncidenceStatus::InProgress),
            diagnose: incidence.diagnose,
            comment: String::new(),
        })
    }

    /// Apply a TIC management form to both copies and record the comment.
    pub async fn manage_incidence(&self, id: &str, form: ManageIncidenceForm) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("manage-incidence");
        let result = self.try_manage_incidence(&mut run, id, form).await;
        self.conclude(run, result).await
    }

    /// Delete both copies of an incidence reported by the signed-in user.
    pub async fn delete_own_incidence(&self, id: &str) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("delete-own-incidence");
        let result = self.try_delete_own_incidence(&mut run, id).await;
        self.conclude(run, result).await
    }

    /// Delete both copies of any incidence (TIC).
    pub async fn delete_incidence(&self, id: &str) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("delete-incidence");
        let result = self.try_delete_incidence(&mut run, id).await;
        self.conclude(run, result).await
    }

    async fn global_incidence(&self, id: &str) -> Result<Incidence, AppError> {
        self.store
            .get_as(&paths::incidence(id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incidence {} not found", id)))
    }

    async fn try_add_incidence(
        &self,
        run: &mut FormRun,
        form: IncidenceForm,
    ) -> Result<Completed, AppError> {
        let user = self.current_user().await?;

        run.enter(FormPhase::Validating);
        validate(&form, &user.uid)?;

        run.enter(FormPhase::ImageUploading);
        let image = self.upload_image(&user.uid, &form.image).await?;

        run.enter(FormPhase::Persisting);
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut incidence = Incidence {
            id: String::new(),
            title: form.title,
            description: form.description,
            status: IncidenceStatus::Open,
            created_at: Utc::now().timestamp_millis(),
            image,
            classroom_id: form.classroom_id,
            device_id: form.device_id,
            reported_by_user_id: user.uid.clone(),
            diagnose: String::new(),
            is_closed: false,
            user_id: None,
        };
        let owner_copy = serde_json::to_value(&incidence)?;
        incidence.user_id = Some(user.uid.clone());
        let global_copy = serde_json::to_value(&incidence)?;

        let batch = WriteBatch::new()
            .set(paths::user_incidence(&user.uid, &id), owner_copy)
            .set(paths::incidence(&id), global_copy);
        self.store.commit(batch).await?;

        tracing::info!(incidence_id = %id, uid = %user.uid, "Incidence reported");
        Ok(Completed::new(Toast::success("Incidencia añadida exitosamente")).with_id(id))
    }

    async fn try_update_incidence(
        &self,
        run: &mut FormRun,
        id: &str,
        form: IncidenceForm,
    ) -> Result<Completed, AppError> {
        let user = self.current_user().await?;

        run.enter(FormPhase::Validating);
        validate(&form, &user.uid)?;

        let owner_path = paths::user_incidence(&user.uid, id);
        let current: Incidence = self
            .store
            .get_as(&owner_path)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Incidence {} not found", id)))?;

        let image = self
            .replace_image(run, &user.uid, &current.image, &form.image)
            .await?;

        run.enter(FormPhase::Persisting);
        let changes = json!({
            "title": form.title,
            "description": form.description,
            "image": image,
            "classroomId": form.classroom_id,
            "deviceId": form.device_id,
        });
        let batch = WriteBatch::new()
            .update(owner_path, changes.clone())
            .update(paths::incidence(id), changes);
        self.store.commit(batch).await?;
        Ok(Completed::new(Toast::success("Incidencia actualizada exitosamente")).with_id(id))
    }

    async fn try_manage_incidence(
        &self,
        run: &mut FormRun,
        id: &str,
        form: ManageIncidenceForm,
    ) -> Result<Completed, AppError> {
        let manager = self.current_user().await?;

        run.enter(FormPhase::Validating);
        validate_manage(&form)?;
        let (status, is_closed) = managed_status(&form)
            .ok_or_else(|| AppError::Validation("status: campo obligatorio".to_string()))?;

        let incidence = self.global_incidence(id).await?;
        let reporter = incidence.reported_by_user_id;

        run.enter(FormPhase::Persisting);
        let changes = json!({
            "status": status,
            "diagnose": form.diagnose.trim(),
            "isClosed": is_closed,
        });
        let mut batch = WriteBatch::new()
            .update(paths::user_incidence(&reporter, id), changes.clone())
            .update(paths::incidence(id), changes);

        let comment = form.comment.trim();
        if !comment.is_empty() {
            let comment_id = uuid::Uuid::new_v4().simple().to_string();
            let data = json!({
                "userId": manager.uid,
                "message": comment,
                "createdAt": Utc::now().timestamp_millis(),
            });
            batch = batch
                .set(
                    format!("{}/{}", paths::user_incidence_comments(&reporter, id), comment_id),
                    data.clone(),
                )
                .set(
                    format!("{}/{}", paths::incidence_comments(id), comment_id),
                    data,
                );
        }
        self.store.commit(batch).await?;

        tracing::info!(incidence_id = id, status = status.as_str(), "Incidence managed");
        Ok(Completed::new(Toast::success("Incidencia actualizada exitosamente")).with_id(id))
    }

    async fn try_delete_own_incidence(
        &self,
        run: &mut FormRun,
        id: &str,
    ) -> Result<Completed, AppError> {
        let user = self.current_user().await?;

        let owner_path = paths::user_incidence(&user.uid, id);
        let owned = self
            .store
            .get_as::<Incidence>(&owner_path)
            .await?
            .is_some_and(|incidence| incidence.reported_by_user_id == user.uid);
        if !owned {
            tracing::warn!(incidence_id = id, uid = %user.uid, "Delete of an incidence not reported by the user");
            return Err(AppError::NotFound(format!("Incidence {} not found", id)));
        }

        run.enter(FormPhase::Persisting);
        let mut batch = WriteBatch::new().delete(owner_path);
        match self.store.get_as::<Incidence>(&paths::incidence(id)).await? {
            Some(global) if global.reported_by_user_id == user.uid => {
                batch = batch.delete(paths::incidence(id));
            }
            Some(_) => {
                tracing::error!(incidence_id = id, "Global copy belongs to another reporter, keeping it");
            }
            None => {
                tracing::warn!(incidence_id = id, "Global copy missing, deleting owner copy only");
            }
        }
        self.store.commit(batch).await?;
        Ok(Completed::new(Toast::success("Incidencia borrada exitosamente")).with_id(id))
    }

    async fn try_delete_incidence(&self, run: &mut FormRun, id: &str) -> Result<Completed, AppError> {
        let reporter = self.global_incidence(id).await?.reported_by_user_id;

        run.enter(FormPhase::Persisting);
        let batch = WriteBatch::new()
            .delete(paths::user_incidence(&reporter, id))
            .delete(paths::incidence(id));
        self.store.commit(batch).await?;
        Ok(Completed::new(Toast::success("Incidencia borrada exitosamente")).with_id(id))
    }
}
