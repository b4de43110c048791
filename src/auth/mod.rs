use axum::{
    extract::Request,
    http::{HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Optional API-key gate for dashboard reads.
///
/// With no keys configured every request passes. Ingestion (`POST`) and CORS
/// preflight are never gated since beacons come from anonymous browsers.
pub struct AuthService {
    api_keys: Arc<Vec<String>>,
}

impl AuthService {
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(api_keys),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    pub fn validate_key(&self, key: &str) -> bool {
        if !self.is_enabled() {
            return true;
        }

        // Compare against every key so timing does not reveal which one matched
        self.api_keys
            .iter()
            .fold(false, |found, k| found | bool::from(k.as_bytes().ct_eq(key.as_bytes())))
    }

    pub fn requires_key(&self, method: &Method) -> bool {
        self.is_enabled() && matches!(*method, Method::GET | Method::HEAD)
    }
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if !auth_service.requires_key(request.method()) {
        return next.run(request).await;
    }

    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if !api_key.is_empty() && auth_service.validate_key(api_key) {
        next.run(request).await
    } else {
        tracing::debug!("rejected dashboard request without a valid API key");
        ApiError::Unauthorized.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_keys() {
        let auth = AuthService::new(vec![]);
        assert!(!auth.is_enabled());
        assert!(auth.validate_key(""));
        assert!(!auth.requires_key(&Method::GET));
    }

    #[test]
    fn test_validate_key() {
        let auth = AuthService::new(vec!["alpha".to_string(), "beta".to_string()]);
        assert!(auth.validate_key("beta"));
        assert!(!auth.validate_key("gamma"));
        assert!(!auth.validate_key("alph"));
    }

    #[test]
    fn test_only_reads_are_gated() {
        let auth = AuthService::new(vec!["alpha".to_string()]);
        assert!(auth.requires_key(&Method::GET));
        assert!(!auth.requires_key(&Method::POST));
        assert!(!auth.requires_key(&Method::OPTIONS));
    }
}
