//! Configuration and presets for OpenAI-compatible completion engines.
//!
//! Each engine that speaks the OpenAI chat completions protocol gets a
//! factory returning an [`OpenAiCompatConfig`] with its base URL.

use secrecy::SecretString;

/// Groq's OpenAI-compatible endpoint.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// OpenAI's own endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for an OpenAI-compatible provider.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`]. Holds the API
/// key as a `SecretString` so it never shows up in `Debug` output.
#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    /// Provider name reported in spans and logs (e.g., "groq").
    pub provider_name: String,
    pub base_url: String,
    pub api_key: SecretString,
    /// Model used when a request leaves its model empty.
    pub model: String,
}

/// Groq defaults. Base URL: `https://api.groq.com/openai/v1`.
pub fn groq_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "groq".into(),
        base_url: GROQ_BASE_URL.into(),
        api_key,
        model: model.into(),
    }
}

/// OpenAI defaults. Base URL: `https://api.openai.com/v1`.
pub fn openai_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openai".into(),
        base_url: OPENAI_BASE_URL.into(),
        api_key,
        model: model.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_groq_defaults() {
        let config = groq_defaults(SecretString::from("gsk-test".to_string()), "llama-3.3-70b-versatile");
        assert_eq!(config.provider_name, "groq");
        assert_eq!(config.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(config.api_key.expose_secret(), "gsk-test");
        assert_eq!(config.model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_openai_defaults() {
        let config = openai_defaults(SecretString::from("sk-test".to_string()), "gpt-4o-mini");
        assert_eq!(config.provider_name, "openai");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = groq_defaults(SecretString::from("gsk-very-secret".to_string()), "m");
        assert!(!format!("{config:?}").contains("gsk-very-secret"));
    }
}
