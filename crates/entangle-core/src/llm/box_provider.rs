//! Type-erased completion provider.
//!
//! The provider is picked from `[completion] provider` at startup, while
//! `CompletionClient` holds one concrete value for the life of the process.
//! `LlmProvider` uses RPITIT and so cannot be a trait object; `ErasedProvider`
//! boxes its future instead and is implemented for every `LlmProvider`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use entangle_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use super::provider::LlmProvider;

type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + 'a>>;

/// Object-safe mirror of [`LlmProvider`].
trait ErasedProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete_boxed<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a>;
}

impl<T: LlmProvider> ErasedProvider for T {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn complete_boxed<'a>(&'a self, request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(self.complete(request))
    }
}

/// The completion engine chosen at startup (Groq, OpenAI, a custom
/// OpenAI-compatible endpoint, or a scripted stub in tests).
pub struct BoxLlmProvider {
    inner: Box<dyn ErasedProvider>,
}

impl BoxLlmProvider {
    pub fn new<T: LlmProvider + 'static>(provider: T) -> Self {
        Self {
            inner: Box::new(provider),
        }
    }

    /// Provider name, reported as `gen_ai.system` on completion spans.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.inner.complete_boxed(request).await
    }
}

impl fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxLlmProvider")
            .field("name", &self.name())
            .finish()
    }
}
