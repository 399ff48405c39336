//! Route guards.
//!
//! Each guard either lets the navigation through or names the route to
//! redirect to. The role guards only look at the stored user; the
//! authentication guards also ask the account provider.

mod layer;

pub use layer::*;

use crate::auth::AuthProvider;
use crate::models::User;
use crate::session::Session;

/// Route every failing guard sends the user to.
pub const AUTH_ROUTE: &str = "/auth";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect(String),
}

impl GuardOutcome {
    fn to_auth() -> Self {
        GuardOutcome::Redirect(AUTH_ROUTE.to_string())
    }
}

/// Landing route after authentication.
pub fn home_for(user: Option<&User>) -> &'static str {
    match user {
        Some(user) if user.tic_role => "main/incidencias",
        _ => "main/mis-incidencias",
    }
}

/// Allow iff the provider has a principal and a user is stored.
///
/// On failure the provider and the stored user are both cleared.
pub async fn auth_guard(auth: &AuthProvider, session: &Session) -> GuardOutcome {
    let authenticated = provider_authenticated(auth).await;
    if authenticated && session.current_user().await.is_some() {
        return GuardOutcome::Allow;
    }

    if let Err(e) = auth.sign_out().await {
        tracing::error!("Sign-out after failed auth guard: {}", e);
    }
    if let Err(e) = session.clear_user().await {
        tracing::error!("Clearing stored user after failed auth guard: {}", e);
    }
    GuardOutcome::to_auth()
}

/// Keep authenticated users away from the sign-in pages.
pub async fn no_auth_guard(auth: &AuthProvider, session: &Session) -> GuardOutcome {
    if !provider_authenticated(auth).await {
        return GuardOutcome::Allow;
    }
    let user = session.current_user().await;
    GuardOutcome::Redirect(home_for(user.as_ref()).to_string())
}

pub fn tic_role_guard(user: Option<&User>) -> GuardOutcome {
    match user {
        Some(user) if user.tic_role => GuardOutcome::Allow,
        _ => GuardOutcome::to_auth(),
    }
}

pub fn admin_role_guard(user: Option<&User>) -> GuardOutcome {
    match user {
        Some(user) if user.admin_role => GuardOutcome::Allow,
        _ => GuardOutcome::to_auth(),
    }
}

async fn provider_authenticated(auth: &AuthProvider) -> bool {
    auth.is_authenticated().await.unwrap_or_else(|e| {
        tracing::error!("Checking authentication state: {}", e);
        false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::init_database;
    use serde_json::json;
    use tempfile::TempDir;

    fn stored(value: serde_json::Value) -> User {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_tic_guard_accepts_numeric_flag() {
        let tic = stored(json!({"uid": "u1", "name": "Técnico", "email": "t@ies.es", "tic_role": 1}));
        assert_eq!(tic_role_guard(Some(&tic)), GuardOutcome::Allow);

        let plain = stored(json!({"uid": "u2", "name": "Alumno", "email": "a@ies.es", "tic_role": false}));
        assert_eq!(
            tic_role_guard(Some(&plain)),
            GuardOutcome::Redirect("/auth".to_string())
        );
        assert_eq!(tic_role_guard(None), GuardOutcome::Redirect("/auth".to_string()));
    }

    #[test]
    fn test_admin_guard_checks_admin_flag() {
        let tic_only = stored(json!({"uid": "u1", "name": "Técnico", "email": "t@ies.es", "tic_role": true}));
        assert_eq!(
            admin_role_guard(Some(&tic_only)),
            GuardOutcome::Redirect("/auth".to_string())
        );

        let admin = stored(json!({"uid": "u2", "name": "Dirección", "email": "d@ies.es", "admin_role": 1}));
        assert_eq!(admin_role_guard(Some(&admin)), GuardOutcome::Allow);
    }

    #[tokio::test]
    async fn test_auth_guards_follow_provider_and_session() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        let auth = AuthProvider::new(pool);
        let session = Session::open(dir.path().join("session.json")).await.unwrap();

        assert_eq!(auth_guard(&auth, &session).await, GuardOutcome::Redirect("/auth".to_string()));
        assert_eq!(no_auth_guard(&auth, &session).await, GuardOutcome::Allow);

        let account = auth.sign_up("tic@ies.es", "contraseña1", None).await.unwrap();
        // Principal without a stored user is signed out again.
        assert_eq!(auth_guard(&auth, &session).await, GuardOutcome::Redirect("/auth".to_string()));
        assert!(!auth.is_authenticated().await.unwrap());

        auth.sign_in("tic@ies.es", "contraseña1").await.unwrap();
        let user = User {
            uid: account.uid,
            name: "Técnico TIC".to_string(),
            email: account.email,
            tic_role: true,
            admin_role: false,
        };
        session.save_user(&user).await.unwrap();

        assert_eq!(auth_guard(&auth, &session).await, GuardOutcome::Allow);
        assert_eq!(
            no_auth_guard(&auth, &session).await,
            GuardOutcome::Redirect("main/incidencias".to_string())
        );
    }
}
