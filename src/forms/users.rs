//! Sign-in, sign-up, privileged user creation, password recovery and
//! sign-out.

use super::{Completed, FormPhase, FormRun, Forms, Outcome, Validator};
use crate::errors::AppError;
use crate::guards::{home_for, AUTH_ROUTE};
use crate::models::{CreatePrivilegedUserRequest, RecoveryRequest, SignInRequest, SignUpRequest, User};
use crate::session::Toast;
use crate::store::paths;

const WRONG_CREDENTIALS: &str = "Error, correo o contraseña equivocados";
const USER_NOT_CREATED: &str = "Error al crear usuario";

fn validate_account(email: &str, password: &str, name: &str) -> Result<(), AppError> {
    Validator::new()
        .email("email", email)
        .min_length("password", password, 8)
        .min_length("name", name, 6)
        .finish()
}

impl Forms {
    /// Sign in, store the profile in the session and route by role.
    pub async fn sign_in(&self, request: SignInRequest) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("sign-in");
        let result = self.try_sign_in(&mut run, request).await;
        self.conclude(run, result).await
    }

    /// Register a plain user and sign it in.
    pub async fn sign_up(&self, request: SignUpRequest) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("sign-up");
        let result = self.try_sign_up(&mut run, request).await;
        self.conclude(run, result).await
    }

    /// Register a user with the chosen role flags. The signed-in admin
    /// stays signed in.
    pub async fn create_privileged_user(&self, request: CreatePrivilegedUserRequest) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("create-privileged-user");
        let result = self.try_create_privileged_user(&mut run, request).await;
        self.conclude(run, result).await
    }

    pub async fn send_recovery(&self, request: RecoveryRequest) -> Outcome {
        let _loading = self.session.loading();
        let mut run = FormRun::start("forgot-password");
        let result = self.try_send_recovery(&mut run, request).await;
        self.conclude(run, result).await
    }

    /// Drop the principal and the stored user.
    pub async fn sign_out(&self) -> Result<String, AppError> {
        self.auth.sign_out().await?;
        self.session.clear_user().await?;
        Ok(AUTH_ROUTE.to_string())
    }

    async fn try_sign_in(&self, run: &mut FormRun, request: SignInRequest) -> Result<Completed, AppError> {
        run.enter(FormPhase::Validating);
        Validator::new()
            .email("email", &request.email)
            .required("password", &request.password)
            .finish()?;

        run.enter(FormPhase::Persisting);
        let account = self
            .auth
            .sign_in(&request.email, &request.password)
            .await
            .map_err(|e| match e {
                AppError::Authentication(_) => AppError::Authentication(WRONG_CREDENTIALS.to_string()),
                other => other,
            })?;

        let user: Option<User> = match self.store.get_as(&paths::user(&account.uid)).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(uid = %account.uid, "Reading user profile: {}", e);
                self.auth.sign_out().await?;
                return Err(e);
            }
        };
        let Some(user) = user else {
            tracing::warn!(uid = %account.uid, "Account without a user profile");
            self.auth.sign_out().await?;
            return Err(AppError::Authentication(WRONG_CREDENTIALS.to_string()));
        };

        if account.display_name.as_deref() != Some(user.name.as_str()) {
            self.auth.update_profile(&user.name).await?;
        }

        self.session.save_user(&user).await?;
        let toast = Toast::success(format!("Sesión iniciada como {}", user.name))
            .with_icon("person-circle-outline");
        Ok(Completed::new(toast)
            .with_id(user.uid.clone())
            .redirect_to(home_for(Some(&user))))
    }

    async fn try_sign_up(&self, run: &mut FormRun, request: SignUpRequest) -> Result<Completed, AppError> {
        run.enter(FormPhase::Validating);
        validate_account(&request.email, &request.password, &request.name)?;

        run.enter(FormPhase::Persisting);
        let account = self
            .auth
            .sign_up(&request.email, &request.password, Some(&request.name))
            .await?;
        let user = User {
            uid: account.uid,
            name: request.name,
            email: account.email,
            tic_role: false,
            admin_role: false,
        };
        self.write_profile(&user).await?;

        self.session.save_user(&user).await?;
        Ok(Completed::new(Toast::success("Usuario creado exitosamente"))
            .with_id(user.uid.clone())
            .redirect_to(home_for(Some(&user))))
    }

    async fn try_create_privileged_user(
        &self,
        run: &mut FormRun,
        request: CreatePrivilegedUserRequest,
    ) -> Result<Completed, AppError> {
        run.enter(FormPhase::Validating);
        validate_account(&request.email, &request.password, &request.name)?;

        run.enter(FormPhase::Persisting);
        let account = self
            .auth
            .create_account(&request.email, &request.password, Some(&request.name))
            .await?;
        let user = User {
            uid: account.uid,
            name: request.name,
            email: account.email,
            tic_role: request.tic_role,
            admin_role: request.admin_role,
        };
        self.write_profile(&user).await?;

        tracing::info!(
            uid = %user.uid,
            tic_role = user.tic_role,
            admin_role = user.admin_role,
            "Privileged user created"
        );
        Ok(Completed::new(Toast::success("Usuario creado exitosamente")).with_id(user.uid))
    }

    async fn try_send_recovery(
        &self,
        run: &mut FormRun,
        request: RecoveryRequest,
    ) -> Result<Completed, AppError> {
        run.enter(FormPhase::Validating);
        Validator::new().email("email", &request.email).finish()?;

        run.enter(FormPhase::Persisting);
        self.auth.send_recovery_email(&request.email).await?;
        let toast = Toast::notice(
            "Correo enviado correctamente. Revise su bandeja de entrada.",
            "mail-unread-outline",
        );
        Ok(Completed::new(toast).redirect_to(AUTH_ROUTE))
    }

    /// Write `users/{uid}`; the password never reaches the document.
    async fn write_profile(&self, user: &User) -> Result<(), AppError> {
        let data = serde_json::to_value(user)?;
        self.store.set(&paths::user(&user.uid), data).await.map_err(|e| {
            tracing::error!(uid = %user.uid, "Writing user profile: {}", e);
            AppError::Document(USER_NOT_CREATED.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;

    fn sign_up_request(email: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.to_string(),
            password: "contraseña1".to_string(),
            name: "Alumno Uno".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let fx = fixture().await;

        let outcome = fx.forms.sign_up(sign_up_request("alumno@ies.es")).await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.redirect.as_deref(), Some("main/mis-incidencias"));
        let uid = outcome.id.unwrap();

        let profile = fx.store.get(&paths::user(&uid)).await.unwrap().unwrap();
        assert!(profile.get("password").is_none());
        assert_eq!(profile["name"], "Alumno Uno");

        fx.forms.sign_out().await.unwrap();
        assert!(fx.session.current_user().await.is_none());
        fx.session.drain_toasts().await;

        let outcome = fx
            .forms
            .sign_in(SignInRequest {
                email: "Alumno@ies.es".to_string(),
                password: "contraseña1".to_string(),
            })
            .await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(fx.session.current_user().await.unwrap().uid, uid);
        let toasts = fx.session.drain_toasts().await;
        assert_eq!(toasts[0].message, "Sesión iniciada como Alumno Uno");
        assert_eq!(toasts[0].icon, "person-circle-outline");
    }

    #[tokio::test]
    async fn test_wrong_password_shows_generic_message() {
        let fx = fixture().await;
        fx.forms.sign_up(sign_up_request("alumno@ies.es")).await;
        fx.forms.sign_out().await.unwrap();
        fx.session.drain_toasts().await;

        let outcome = fx
            .forms
            .sign_in(SignInRequest {
                email: "alumno@ies.es".to_string(),
                password: "incorrecta".to_string(),
            })
            .await;
        assert!(!outcome.success);
        let toasts = fx.session.drain_toasts().await;
        assert_eq!(toasts[0].message, WRONG_CREDENTIALS);
        assert!(!fx.auth.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_profile_shows_generic_message() {
        let fx = fixture().await;
        fx.auth
            .create_account("huerfano@ies.es", "contraseña1", Some("Sin Perfil"))
            .await
            .unwrap();

        let outcome = fx
            .forms
            .sign_in(SignInRequest {
                email: "huerfano@ies.es".to_string(),
                password: "contraseña1".to_string(),
            })
            .await;
        assert!(matches!(
            outcome.error,
            Some(AppError::Authentication(ref msg)) if msg == WRONG_CREDENTIALS
        ));
        assert!(!fx.auth.is_authenticated().await.unwrap());
        assert!(fx.session.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_profile_reports_store_error() {
        let fx = fixture().await;
        let account = fx
            .auth
            .create_account("roto@ies.es", "contraseña1", Some("Perfil Roto"))
            .await
            .unwrap();
        fx.store
            .set(&paths::user(&account.uid), serde_json::json!({"name": 42}))
            .await
            .unwrap();

        let outcome = fx
            .forms
            .sign_in(SignInRequest {
                email: "roto@ies.es".to_string(),
                password: "contraseña1".to_string(),
            })
            .await;
        let error = outcome.error.unwrap();
        assert!(matches!(error, AppError::Document(_)), "{:?}", error);
        assert_ne!(error.message(), WRONG_CREDENTIALS);
        assert!(!fx.auth.is_authenticated().await.unwrap());
    }

    #[tokio::test]
    async fn test_tic_user_lands_on_incidences() {
        let fx = fixture().await;
        signed_in(&fx, "admin", false, true).await;
        let outcome = fx
            .forms
            .create_privileged_user(CreatePrivilegedUserRequest {
                email: "tic@ies.es".to_string(),
                password: "contraseña1".to_string(),
                name: "Técnico TIC".to_string(),
                tic_role: true,
                admin_role: false,
            })
            .await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(fx.session.current_user().await.unwrap().uid, "admin");

        let outcome = fx
            .forms
            .sign_in(SignInRequest {
                email: "tic@ies.es".to_string(),
                password: "contraseña1".to_string(),
            })
            .await;
        assert_eq!(outcome.redirect.as_deref(), Some("main/incidencias"));
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_fails() {
        let fx = fixture().await;
        assert!(fx.forms.sign_up(sign_up_request("alumno@ies.es")).await.success);
        let outcome = fx.forms.sign_up(sign_up_request("alumno@ies.es")).await;
        assert!(matches!(outcome.error, Some(AppError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_recovery_redirects_to_auth() {
        let fx = fixture().await;
        fx.forms.sign_up(sign_up_request("alumno@ies.es")).await;
        fx.session.drain_toasts().await;

        let outcome = fx
            .forms
            .send_recovery(RecoveryRequest {
                email: "alumno@ies.es".to_string(),
            })
            .await;
        assert_eq!(outcome.redirect.as_deref(), Some(AUTH_ROUTE));
        let toasts = fx.session.drain_toasts().await;
        assert_eq!(toasts[0].icon, "mail-unread-outline");

        let outcome = fx
            .forms
            .send_recovery(RecoveryRequest {
                email: "nadie@ies.es".to_string(),
            })
            .await;
        assert!(!outcome.success);
    }
}
