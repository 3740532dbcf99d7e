//! HTTP/REST API layer for Entangle.
//!
//! Axum-based API with optional API key authentication, a uniform error body,
//! and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
