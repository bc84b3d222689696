//! Bearer-token authentication for the REST/WS surface. An empty
//! configured token disables auth entirely — every request passes. The
//! comparison is constant-time so a configured token can't be recovered
//! by timing the rejection path.

use super::state::AppState;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

pub struct AuthBearer;

pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, axum::Json(serde_json::json!({ "error": "invalid or missing bearer token" }))).into_response()
    }
}

impl FromRequestParts<Arc<AppState>> for AuthBearer {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        if !state.auth_enabled() {
            return Ok(AuthBearer);
        }

        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match token {
            Some(token) if constant_time_eq(token.as_bytes(), state.auth_token.as_bytes()) => Ok(AuthBearer),
            _ => {
                warn!("rejected request with missing or invalid bearer token");
                Err(AuthRejection)
            }
        }
    }
}

fn check_token(configured: &str, candidate: &str) -> bool {
    configured.is_empty() || constant_time_eq(candidate.as_bytes(), configured.as_bytes())
}

/// Validates a token pulled from a WebSocket `?token=` query parameter,
/// where the `FromRequestParts` extractor above doesn't apply.
pub fn validate_token(state: &AppState, token: &str) -> bool {
    check_token(&state.auth_token, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_configured_token_disables_auth() {
        assert!(check_token("", "anything"));
    }

    #[test]
    fn mismatched_token_is_rejected() {
        assert!(!check_token("secret", "wrong"));
    }

    #[test]
    fn matching_token_is_accepted() {
        assert!(check_token("secret", "secret"));
    }

    #[test]
    fn constant_time_eq_rejects_mismatch() {
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(constant_time_eq(b"abc", b"abc"));
    }
}
