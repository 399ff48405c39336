//! Classroom add, edit and delete.

use serde_json::json;

use super::{Completed, FormPhase, FormRun, Forms, Outcome, Validator};
use crate::errors::AppError;
use crate::models::ClassroomForm;
use crate::session::Toast;
use crate::store::paths;

fn validate(form: &ClassroomForm) -> Result<(), AppError> {
    Validator::new()
        .length("name", &form.name, 6, 50)
        .length("location", &form.location, 6, 50)
        .finish()
}

impl Forms {
    pub async fn add_classroom(&self, form: ClassroomForm) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("add-classroom");
        let result = self.save_classroom(&mut run, None, form).await;
        self.conclude(run, result).await
    }

    pub async fn update_classroom(&self, id: &str, form: ClassroomForm) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("update-classroom");
        let result = self.save_classroom(&mut run, Some(id), form).await;
        self.conclude(run, result).await
    }

    /// Delete the classroom document. Its devices are left in place.
    pub async fn delete_classroom(&self, id: &str) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("delete-classroom");
        run.enter(FormPhase::Persisting);
        let result = self
            .store
            .delete(&paths::classroom(id))
            .await
            .map(|()| Completed::new(Toast::success("Aula borrada exitosamente")).with_id(id));
        self.conclude(run, result).await
    }

    async fn save_classroom(
        &self,
        run: &mut FormRun,
        id: Option<&str>,
        form: ClassroomForm,
    ) -> Result<Completed, AppError> {
        run.enter(FormPhase::Validating);
        validate(&form)?;

        run.enter(FormPhase::Persisting);
        let data = json!({"name": form.name, "location": form.location});
        match id {
            Some(id) => {
                self.store.update(&paths::classroom(id), data).await?;
                Ok(Completed::new(Toast::success("Aula actualizada exitosamente")).with_id(id))
            }
            None => {
                let id = self.store.add(paths::CLASSROOMS, data).await?;
                Ok(Completed::new(Toast::success("Aula añadida exitosamente")).with_id(id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::models::Classroom;
    use crate::store::QueryOptions;

    fn form(name: &str, location: &str) -> ClassroomForm {
        ClassroomForm {
            name: name.to_string(),
            location: location.to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_update_delete() {
        let fx = fixture().await;

        let outcome = fx.forms.add_classroom(form("Aula 101", "Planta baja")).await;
        assert!(outcome.success);
        assert_eq!(
            outcome.phases,
            vec![
                FormPhase::Editing,
                FormPhase::Validating,
                FormPhase::Persisting,
                FormPhase::Done
            ]
        );
        let id = outcome.id.unwrap();

        let outcome = fx.forms.update_classroom(&id, form("Aula 102", "Primera planta")).await;
        assert!(outcome.success);
        let stored: Classroom = fx.store.get_as(&paths::classroom(&id)).await.unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.name, "Aula 102");

        assert!(fx.forms.delete_classroom(&id).await.success);
        assert!(fx.store.get(&paths::classroom(&id)).await.unwrap().is_none());

        let messages: Vec<_> = fx
            .session
            .drain_toasts()
            .await
            .into_iter()
            .map(|t| t.message)
            .collect();
        assert_eq!(
            messages,
            [
                "Aula añadida exitosamente",
                "Aula actualizada exitosamente",
                "Aula borrada exitosamente"
            ]
        );
    }

    #[tokio::test]
    async fn test_short_name_is_rejected_before_persisting() {
        let fx = fixture().await;

        let outcome = fx.forms.add_classroom(form("A1", "Planta baja")).await;
        assert!(!outcome.success);
        assert!(outcome.error.as_ref().is_some_and(AppError::is_validation));
        assert!(!outcome.phases.contains(&FormPhase::Persisting));
        assert_eq!(fx.store.count(paths::CLASSROOMS, &QueryOptions::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_of_missing_classroom_fails() {
        let fx = fixture().await;
        let outcome = fx.forms.update_classroom("nope", form("Aula 101", "Planta baja")).await;
        assert!(matches!(outcome.error, Some(AppError::NotFound(_))));
    }
}
