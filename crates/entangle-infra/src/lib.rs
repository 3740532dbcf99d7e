//! Infrastructure layer for Entangle.
//!
//! Implementations of the ports defined in `entangle-core`: the SQLite chat
//! store, the OpenAI-compatible completion provider, and configuration
//! loading from the data directory.

pub mod config;
pub mod llm;
pub mod sqlite;
