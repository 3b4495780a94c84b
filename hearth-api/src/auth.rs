use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::ApiState;

/// Extract bearer token from Authorization header
fn extract_token(auth_header: Option<&str>) -> Option<&str> {
    auth_header?.strip_prefix("Bearer ").map(str::trim)
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Requires `Authorization: Bearer <DISPATCH_API_KEY>` when a key is configured.
pub async fn auth_middleware(req: Request, next: axum::middleware::Next) -> Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let configured = req.extensions().get::<ApiState>().and_then(|s| s.api_key.clone());
    let expected = match configured {
        Some(key) => key,
        None => return next.run(req).await,
    };

    let authorized = extract_token(req.headers().get(AUTHORIZATION).and_then(|h| h.to_str().ok()))
        .map(|token| constant_time_eq(token.as_bytes(), expected.as_bytes()))
        .unwrap_or(false);

    if !authorized {
        tracing::debug!("Rejected request to {} with missing or wrong API key", req.uri().path());
        return ApiError::Unauthorized.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(extract_token(Some("Bearer abc ")), Some("abc"));
        assert_eq!(extract_token(Some("Basic abc")), None);
        assert_eq!(extract_token(None), None);
    }

    #[test]
    fn compares_keys() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }
}
