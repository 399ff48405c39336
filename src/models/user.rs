//! User model and the requests of the authentication pages.

use serde::{Deserialize, Deserializer, Serialize};

/// The profile stored at `users/{uid}` and persisted in the local session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "role_flag")]
    pub tic_role: bool,
    #[serde(default, deserialize_with = "role_flag")]
    pub admin_role: bool,
}

/// Role flags have been written both as booleans and as `0`/`1`.
fn role_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(flag) => flag,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Request body of the admin-only user creation page.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrivilegedUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default, deserialize_with = "role_flag")]
    pub tic_role: bool,
    #[serde(default, deserialize_with = "role_flag")]
    pub admin_role: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecoveryRequest {
    pub email: String,
}
