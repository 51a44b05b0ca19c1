//! `spec.md` §4.I steps 2-4: bearer-token extraction, verification, and the
//! scope/environment wildcard checks.

use std::sync::Arc;

use actix_web::HttpRequest;
use portway_auth::{TokenStore, VerifiedToken};
use portway_common::PortwayError;

pub fn extract_bearer(req: &HttpRequest) -> Result<&str, PortwayError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PortwayError::unauthenticated("missing Authorization header"))?;
    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| PortwayError::unauthenticated("Authorization header is not a Bearer token"))
}

/// PBKDF2-verifies the bearer token on the blocking threadpool: `verify`
/// re-derives the hash under every active token's salt (`spec.md` §4.A), a
/// CPU-bound scan that must not stall the async reactor.
pub async fn verify(store: &Arc<TokenStore>, req: &HttpRequest) -> Result<VerifiedToken, PortwayError> {
    let token = extract_bearer(req)?.to_owned();
    let store = Arc::clone(store);
    portway_common::run_on_blocking_threadpool(
        move || {
            store
                .verify(&token)
                .map_err(|_| PortwayError::unauthenticated("invalid or expired token"))
        },
        PortwayError::internal,
    )
    .await
}

pub fn check_scope(token: &VerifiedToken, full_path: &str) -> Result<(), PortwayError> {
    if token.allows_scope(full_path) {
        Ok(())
    } else {
        Err(PortwayError::forbidden("Forbidden"))
    }
}

pub fn check_environment(token: &VerifiedToken, env: &str) -> Result<(), PortwayError> {
    if token.allows_environment(env) {
        Ok(())
    } else {
        Err(PortwayError::forbidden("Forbidden"))
    }
}
