//! Completion provider implementations.
//!
//! Provides the provider factory ([`create_provider`]) that constructs the
//! right [`BoxLlmProvider`] from a [`CompletionConfig`], and the lookup of the
//! API key from the configured environment variable.

pub mod openai_compat;

use secrecy::SecretString;

use entangle_core::llm::box_provider::BoxLlmProvider;
use entangle_types::config::CompletionConfig;
use entangle_types::llm::LlmError;

use self::openai_compat::config::{OpenAiCompatConfig, groq_defaults, openai_defaults};
use self::openai_compat::OpenAiCompatibleProvider;

/// Read the API key named by `config.api_key_env`.
///
/// A missing or empty variable is `AuthenticationFailed`.
pub fn api_key_from_env(config: &CompletionConfig) -> Result<SecretString, LlmError> {
    match std::env::var(&config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(SecretString::from(key)),
        _ => {
            tracing::warn!(var = %config.api_key_env, "Completion API key is not set");
            Err(LlmError::AuthenticationFailed)
        }
    }
}

/// Create a [`BoxLlmProvider`] from a [`CompletionConfig`].
///
/// `base_url`, when set, wins over the preset for `provider`. Without it,
/// `provider` must name a known preset ("groq" or "openai").
pub fn create_provider(
    config: &CompletionConfig,
    api_key: SecretString,
) -> Result<BoxLlmProvider, LlmError> {
    let oai_config = match (config.base_url.as_deref(), config.provider.as_str()) {
        (Some(base_url), name) => OpenAiCompatConfig {
            provider_name: name.to_string(),
            base_url: base_url.to_string(),
            api_key,
            model: config.model.clone(),
        },
        (None, "groq") => groq_defaults(api_key, &config.model),
        (None, "openai") => openai_defaults(api_key, &config.model),
        (None, other) => {
            return Err(LlmError::InvalidRequest(format!(
                "unknown provider '{other}'; set completion.base_url for custom endpoints"
            )));
        }
    };

    tracing::info!(
        provider = %oai_config.provider_name,
        base_url = %oai_config.base_url,
        model = %oai_config.model,
        "Completion provider configured"
    );
    Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::new(oai_config)))
}
