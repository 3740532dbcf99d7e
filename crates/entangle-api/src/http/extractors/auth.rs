//! API key authentication extractor.
//!
//! Extracts and verifies API keys from:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! Keys are SHA-256 hashed and compared against `[auth] keys` in the config.
//! With no keys configured, every caller is anonymous and unrestricted.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use entangle_types::config::AuthConfig;

use crate::http::error::AppError;
use crate::state::AppState;

/// Who is calling. Extracting this validates the API key when auth is on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// Authentication is disabled.
    Anonymous,
    /// Key matched the configured entry for this principal.
    Principal(String),
}

impl Caller {
    /// Whether this caller may submit messages as `sender_id`.
    pub fn may_send_as(&self, sender_id: &str) -> bool {
        match self {
            Caller::Anonymous => true,
            Caller::Principal(principal) => principal == sender_id,
        }
    }
}

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        resolve_caller(parts, &state.auth)
    }
}

fn resolve_caller(parts: &Parts, auth: &AuthConfig) -> Result<Caller, AppError> {
    if !auth.is_enabled() {
        return Ok(Caller::Anonymous);
    }

    let key_hash = hash_api_key(&extract_api_key(parts)?);
    auth.keys
        .iter()
        .find(|entry| entry.key_sha256.eq_ignore_ascii_case(&key_hash))
        .map(|entry| Caller::Principal(entry.principal.clone()))
        .ok_or_else(|| {
            AppError::Unauthorized(
                "Invalid API key. Provide a valid key via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
            )
        })
}

/// Extract the API key from request headers.
fn extract_api_key(parts: &Parts) -> Result<String, AppError> {
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-API-Key header encoding".to_string())
        })?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
    ))
}

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}
