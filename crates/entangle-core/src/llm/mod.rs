//! Completion engine abstractions for Entangle.
//!
//! This module defines the core traits and the client used by the turn
//! orchestrator:
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch
//! - `CompletionClient`: request building, bounded wait, reply extraction

pub mod box_provider;
pub mod client;
pub mod provider;
