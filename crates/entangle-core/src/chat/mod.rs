//! Chat persistence abstractions for Entangle.
//!
//! This module defines the `ChatRepository` trait that the infrastructure
//! layer implements, an in-process implementation, and the read-only
//! transcript projection.

pub mod memory;
pub mod repository;
pub mod transcript;
