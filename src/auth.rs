//! Bearer-token authentication middleware
//!
//! Every protected endpoint checks the `Authorization` header against the
//! configured token by exact equality, using a constant-time comparison.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::handlers::state::AppState;

/// Authentication errors
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingToken => "Missing Authorization header",
            AuthError::InvalidToken => "Unauthorized access",
        };

        (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
    }
}

/// Constant-time string comparison to prevent timing attacks
///
/// Note: This leaks the length of the shorter string, which is acceptable
/// for bearer tokens where lengths are not secret.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let mut result = (a.len() ^ b.len()) as u8;

    let min_len = std::cmp::min(a.len(), b.len());
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    for i in 0..min_len {
        result |= a_bytes[i] ^ b_bytes[i];
    }

    result == 0
}

/// Validate an Authorization header value against the configured token.
pub fn validate_bearer(header_value: &str, token: &str) -> Result<(), AuthError> {
    let expected = format!("Bearer {token}");
    if constant_time_compare(header_value, &expected) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

/// Authentication middleware for protected routes
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let header_value = match request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
    {
        Some(value) => value,
        None => return AuthError::MissingToken.into_response(),
    };

    if let Err(e) = validate_bearer(&header_value, &state.config.auth_token) {
        return e.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_bearer() {
        assert!(validate_bearer("Bearer secret-token", "secret-token").is_ok());
        assert!(validate_bearer("Bearer wrong", "secret-token").is_err());
        assert!(validate_bearer("secret-token", "secret-token").is_err());
        assert!(validate_bearer("", "secret-token").is_err());
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
