//! API key check for the `/api/v1` routes.
//!
//! Accepts either `Authorization: Bearer <key>` or `X-API-Key: <key>`.

use crate::{handlers::ApiError, state::AppState};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use std::sync::Arc;
use tracing::warn;

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };
    if presented_keys(request.headers()).any(|key| constant_time_eq(key.as_bytes(), expected.as_bytes())) {
        Ok(next.run(request).await)
    } else {
        warn!(path = %request.uri().path(), "rejected request without a valid API key");
        Err(ApiError::Unauthorized)
    }
}

fn presented_keys(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let api_key = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    [bearer, api_key].into_iter().flatten()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

/// A random 256-bit key, URL-safe base64 without padding.
pub fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_generated_keys_are_distinct_and_url_safe() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret-key", b"secret-key"));
        assert!(!constant_time_eq(b"secret-key", b"secret-kez"));
        assert!(!constant_time_eq(b"secret", b"secret-key"));
    }

    #[test]
    fn test_presented_keys_reads_both_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_keys(&headers).count(), 0);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(API_KEY_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(presented_keys(&headers).collect::<Vec<_>>(), vec!["abc", "xyz"]);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(presented_keys(&headers).collect::<Vec<_>>(), vec!["xyz"]);
    }
}
