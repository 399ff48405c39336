//! Form and detail views.
//!
//! Every submission walks `Editing -> Validating -> (ImageUploading) ->
//! Persisting -> Done | Failed`. The final phase raises exactly one toast on
//! the session: the success message, or the message of the first failing
//! operation.

mod classrooms;
mod details;
mod devices;
mod incidences;
mod users;
mod validation;

pub use details::*;
pub use validation::Validator;

use chrono::Utc;
use serde::Serialize;

use crate::auth::AuthProvider;
use crate::blobs::{BlobPayload, BlobStore};
use crate::errors::AppError;
use crate::models::User;
use crate::session::{Session, Toast};
use crate::store::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormPhase {
    Editing,
    Validating,
    ImageUploading,
    Persisting,
    Done,
    Failed,
}

/// Result of a form submission.
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub success: bool,
    pub phases: Vec<FormPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Route to navigate to after the submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip)]
    pub error: Option<AppError>,
}

impl Outcome {
    pub fn last_phase(&self) -> Option<FormPhase> {
        self.phases.last().copied()
    }
}

/// What a successful submission reports.
struct Completed {
    id: Option<String>,
    redirect: Option<String>,
    toast: Toast,
}

impl Completed {
    fn new(toast: Toast) -> Self {
        Self {
            id: None,
            redirect: None,
            toast,
        }
    }

    fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    fn redirect_to(mut self, route: impl Into<String>) -> Self {
        self.redirect = Some(route.into());
        self
    }
}

/// Phase trace of one submission.
struct FormRun {
    form: &'static str,
    phases: Vec<FormPhase>,
}

impl FormRun {
    fn start(form: &'static str) -> Self {
        tracing::debug!(form, "Form submitted");
        Self {
            form,
            phases: vec![FormPhase::Editing],
        }
    }

    fn enter(&mut self, phase: FormPhase) {
        tracing::debug!(form = self.form, ?phase, "Form phase");
        self.phases.push(phase);
    }
}

/// Entry point of every form flow.
#[derive(Clone)]
pub struct Forms {
    store: DocumentStore,
    blobs: BlobStore,
    auth: AuthProvider,
    session: Session,
}

impl Forms {
    pub fn new(store: DocumentStore, blobs: BlobStore, auth: AuthProvider, session: Session) -> Self {
        Self {
            store,
            blobs,
            auth,
            session,
        }
    }

    async fn conclude(&self, mut run: FormRun, result: Result<Completed, AppError>) -> Outcome {
        match result {
            Ok(completed) => {
                run.enter(FormPhase::Done);
                self.session.present_toast(completed.toast).await;
                Outcome {
                    success: true,
                    phases: run.phases,
                    id: completed.id,
                    redirect: completed.redirect,
                    error: None,
                }
            }
            Err(e) => {
                run.enter(FormPhase::Failed);
                tracing::error!(form = run.form, "Form failed: {}", e);
                self.session.present_toast(Toast::error(e.message())).await;
                Outcome {
                    success: false,
                    phases: run.phases,
                    id: None,
                    redirect: None,
                    error: Some(e),
                }
            }
        }
    }

    async fn current_user(&self) -> Result<User, AppError> {
        self.session
            .current_user()
            .await
            .ok_or_else(|| AppError::Authentication("No user signed in".to_string()))
    }

    /// Upload a data-URL image to `{uid}/{millis}` and return its public URL.
    async fn upload_image(&self, uid: &str, image: &str) -> Result<String, AppError> {
        let path = format!("{}/{}", uid, Utc::now().timestamp_millis());
        self.blobs
            .upload(&path, BlobPayload::DataUrl(image.to_string()))
            .await
    }

    /// Swap `current` for `submitted` when the image changed.
    ///
    /// The old object is removed after the upload; a failed removal is only
    /// logged.
    async fn replace_image(
        &self,
        run: &mut FormRun,
        uid: &str,
        current: &str,
        submitted: &str,
    ) -> Result<String, AppError> {
        if submitted.is_empty() || submitted == current {
            return Ok(current.to_string());
        }

        run.enter(FormPhase::ImageUploading);
        let url = self.upload_image(uid, submitted).await?;
        match self.blobs.path_from_public_url(current) {
            Some(old_path) => {
                if !self.blobs.delete(&old_path).await {
                    tracing::warn!(%old_path, "Old image left behind");
                }
            }
            None if !current.is_empty() => {
                tracing::warn!(url = current, "Old image is not in the bucket");
            }
            None => {}
        }
        Ok(url)
    }
}
