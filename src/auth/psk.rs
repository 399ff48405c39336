//! Pre-shared key in front of every route except `/health`.

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, ErrorResponse};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests that do not carry the configured key, either in
/// `x-api-key` or as a bearer token. Without a configured key every request
/// passes.
pub async fn psk_auth_layer(
    expected_psk: Option<String>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = expected_psk else {
        return next.run(request).await;
    };

    match presented_key(&request) {
        Some(key) if constant_time_compare(&key, &expected) => next.run(request).await,
        Some(_) => unauthorized_response("Invalid API key"),
        None => unauthorized_response("Missing API key"),
    }
}

/// The key from `x-api-key`, falling back to `Authorization: Bearer`.
fn presented_key(request: &Request) -> Option<String> {
    let headers = request.headers();
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
        })
        .map(str::to_string)
}

/// Constant-time string comparison.
pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Create an unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    let error = AppError::Unauthorized(message.to_string());
    tracing::warn!("Rejected request: {}", message);
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(&error, Vec::new()))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_comparison() {
        assert!(constant_time_compare("incidencias-key", "incidencias-key"));
        assert!(!constant_time_compare("incidencias-key", "incidencias-kez"));
        assert!(!constant_time_compare("short", "much-longer-key"));
        assert!(!constant_time_compare("", "not-empty"));
    }

    #[test]
    fn test_unauthorized_body() {
        let response = unauthorized_response("Invalid API key");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
