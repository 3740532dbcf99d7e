//! Business logic and repository trait definitions for Entangle.
//!
//! This crate defines the "ports" (repository and provider traits) that the
//! infrastructure layer implements, plus the turn orchestrator that drives
//! them. It depends only on `entangle-types` -- never on `entangle-infra` or
//! any database/IO crate.

pub mod chat;
pub mod llm;
pub mod turn;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
