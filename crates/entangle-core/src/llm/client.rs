//! Completion client used by the turn orchestrator.
//!
//! Turns a chat's prior messages plus the newest user input into a
//! `CompletionRequest`, sends it through a `BoxLlmProvider` under a bounded
//! wait, and returns the reply text. The client never touches the store.

use std::time::Duration;

use tracing::{Instrument, debug, field, info_span, warn};

use entangle_types::chat::ChatMessage;
use entangle_types::config::CompletionConfig;
use entangle_types::llm::{CompletionRequest, LlmError, Message};

use super::box_provider::BoxLlmProvider;

/// Per-process completion parameters.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: u32,
    /// Upper bound on one provider call. Exceeding it is `LlmError::Timeout`.
    pub timeout: Duration,
}

/// Floor for the configured completion timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);

impl CompletionSettings {
    /// `timeout_secs` below [`MIN_TIMEOUT`] is raised to it.
    pub fn from_config(config: &CompletionConfig) -> Self {
        let configured = Duration::from_secs(config.timeout_secs);
        if configured < MIN_TIMEOUT {
            warn!(
                timeout_secs = config.timeout_secs,
                "completion timeout too small, using {}s",
                MIN_TIMEOUT.as_secs()
            );
        }

        Self {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: configured.max(MIN_TIMEOUT),
        }
    }
}

/// Adapter around one external call: prior turns + new input -> reply text.
///
/// No retries. Retry policy belongs to whoever calls the orchestrator.
pub struct CompletionClient {
    provider: BoxLlmProvider,
    settings: CompletionSettings,
}

impl CompletionClient {
    pub fn new(provider: BoxLlmProvider, settings: CompletionSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn settings(&self) -> &CompletionSettings {
        &self.settings
    }

    /// Build the request: prior messages in order, then `new_input` as the
    /// final user message. AI-authored messages map to the assistant role,
    /// every other sender to the user role.
    pub fn build_request(&self, context: &[ChatMessage], new_input: &str) -> CompletionRequest {
        let mut messages: Vec<Message> = context
            .iter()
            .map(|m| {
                if m.sender_id.is_ai() {
                    Message::assistant(m.content.clone())
                } else {
                    Message::user(m.content.clone())
                }
            })
            .collect();
        messages.push(Message::user(new_input));

        CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            system: self.settings.system_prompt.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }

    /// Produce the assistant's reply text for `new_input`.
    ///
    /// Blank replies are reported as `LlmError::EmptyReply` since messages
    /// must carry non-empty content.
    pub async fn complete(
        &self,
        context: &[ChatMessage],
        new_input: &str,
    ) -> Result<String, LlmError> {
        let request = self.build_request(context, new_input);

        let span = info_span!(
            "gen_ai.complete",
            gen_ai.system = self.provider.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
            gen_ai.request.messages = request.messages.len(),
            gen_ai.usage.input_tokens = field::Empty,
            gen_ai.usage.output_tokens = field::Empty,
        );

        let timeout = self.settings.timeout;
        let outcome = tokio::time::timeout(timeout, self.provider.complete(&request))
            .instrument(span.clone())
            .await;

        let response = match outcome {
            Ok(result) => result?,
            Err(_) => return Err(LlmError::Timeout(timeout)),
        };

        span.record("gen_ai.usage.input_tokens", response.usage.input_tokens);
        span.record("gen_ai.usage.output_tokens", response.usage.output_tokens);
        debug!(
            response_id = %response.id,
            stop_reason = %response.stop_reason,
            "Completion received"
        );

        if response.content.trim().is_empty() {
            return Err(LlmError::EmptyReply);
        }
        Ok(response.content)
    }
}
