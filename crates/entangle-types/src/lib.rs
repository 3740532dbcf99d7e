//! Shared domain types for Entangle.
//!
//! This crate contains the core domain types used across the Entangle service:
//! chats, messages, transcripts, turn inputs, completion request/response
//! shapes, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod turn;
