//! LlmProvider trait definition.
//!
//! This is the core abstraction that all completion engine backends
//! implement. Uses RPITIT for `complete`.

use entangle_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for completion engine backends (Groq, OpenAI, etc.).
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in entangle-infra (e.g., `OpenAiCompatibleProvider`).
/// A provider is a pure request/response boundary and holds no chat state.
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "groq", "openai").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
