//! Account provider.
//!
//! Accounts live in the `accounts` table with an argon2id password hash
//! in PHC string form. The installation has a single signed-in principal, persisted in
//! `auth_session` so it survives restarts.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;

/// The principal returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Authentication provider backed by SQLite.
#[derive(Clone)]
pub struct AuthProvider {
    pool: SqlitePool,
}

impl AuthProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Verify credentials and make the account the current principal.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Account, AppError> {
        let row = sqlx::query(
            "SELECT uid, email, password_hash, display_name FROM accounts WHERE email = ?",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            tracing::warn!(email, "Sign-in with unknown email");
            return Err(invalid_credentials());
        };

        let stored: String = row.get("password_hash");
        if !verify_password(password, &stored)? {
            tracing::warn!(email, "Sign-in with wrong password");
            return Err(invalid_credentials());
        }

        let account = Account {
            uid: row.get("uid"),
            email: row.get("email"),
            display_name: row.get("display_name"),
        };
        self.set_current(&account.uid).await?;
        tracing::info!(uid = %account.uid, "Signed in");
        Ok(account)
    }

    /// Register a new account and sign it in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Account, AppError> {
        let account = self.create_account(email, password, display_name).await?;
        self.set_current(&account.uid).await?;
        Ok(account)
    }

    /// Register a new account without touching the current principal.
    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Account, AppError> {
        let email = normalize_email(email);
        let existing = sqlx::query("SELECT uid FROM accounts WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;
        if existing.is_some() {
            return Err(AppError::Authentication("User already registered".to_string()));
        }

        let uid = uuid::Uuid::new_v4().simple().to_string();

        sqlx::query(
            "INSERT INTO accounts (uid, email, password_hash, display_name, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&uid)
        .bind(&email)
        .bind(hash_password(password)?)
        .bind(display_name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::info!(%uid, "Account created");
        Ok(Account {
            uid,
            email,
            display_name: display_name.map(str::to_string),
        })
    }

    pub async fn sign_out(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM auth_session")
            .execute(&self.pool)
            .await?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// The signed-in principal, if any.
    pub async fn current_account(&self) -> Result<Option<Account>, AppError> {
        let row = sqlx::query(
            "SELECT a.uid, a.email, a.display_name FROM auth_session s
             JOIN accounts a ON a.uid = s.uid WHERE s.id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Account {
            uid: row.get("uid"),
            email: row.get("email"),
            display_name: row.get("display_name"),
        }))
    }

    pub async fn is_authenticated(&self) -> Result<bool, AppError> {
        Ok(self.current_account().await?.is_some())
    }

    /// Set the display name of the signed-in principal.
    pub async fn update_profile(&self, display_name: &str) -> Result<(), AppError> {
        let Some(account) = self.current_account().await? else {
            return Err(AppError::Authentication("No user signed in".to_string()));
        };

        sqlx::query("UPDATE accounts SET display_name = ? WHERE uid = ?")
            .bind(display_name)
            .bind(&account.uid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a password recovery request for `email`.
    ///
    /// Delivery is outside this service; the request is kept in
    /// `recovery_requests`.
    pub async fn send_recovery_email(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);
        let row = sqlx::query("SELECT uid FROM accounts WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Err(AppError::Authentication("User not found".to_string()));
        };
        let uid: String = row.get("uid");

        sqlx::query(
            "INSERT INTO recovery_requests (id, uid, email, requested_at) VALUES (?, ?, ?, ?)",
        )
        .bind(uuid::Uuid::new_v4().simple().to_string())
        .bind(&uid)
        .bind(&email)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::info!(%uid, "Password recovery requested");
        Ok(())
    }

    async fn set_current(&self, uid: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO auth_session (id, uid, signed_in_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET uid = excluded.uid, signed_in_at = excluded.signed_in_at",
        )
        .bind(uid)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn invalid_credentials() -> AppError {
    AppError::Authentication("Invalid login credentials".to_string())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check `password` against a stored PHC string. A mismatch is `Ok(false)`;
/// an unreadable hash is an error.
fn verify_password(password: &str, stored: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| AppError::Internal(format!("Stored password hash is invalid: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!("Password verification failed: {}", e))),
    }
}
