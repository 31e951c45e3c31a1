//! LLM Provider implementations

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod traits;

pub use anthropic::AnthropicClient;
pub use mock::ScriptedProvider;
pub use openai::OpenAIClient;
pub use traits::{
    CompletionRequest, CompletionResponse, ImageAttachment, LLMProvider, Message, ProviderError,
    ProviderResult,
};

use crate::config::ProviderConfig;
use std::sync::Arc;

/// Apply config settings to an Anthropic client
fn configure_anthropic(client: AnthropicClient, config: &ProviderConfig) -> AnthropicClient {
    let client = client
        .with_rate_limit(config.rpm)
        .with_model(&config.model);
    match &config.base_url {
        Some(url) => client.with_base_url(url),
        None => client,
    }
}

/// Apply config settings to an OpenAI client
fn configure_openai(client: OpenAIClient, config: &ProviderConfig) -> OpenAIClient {
    let client = client
        .with_rate_limit(config.rpm)
        .with_model(&config.model);
    match &config.base_url {
        Some(url) => client.with_base_url(url),
        None => client,
    }
}

/// Default model of a provider by name
pub fn default_model_for(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "anthropic" | "claude" => Some(anthropic::DEFAULT_MODEL),
        "openai" | "gpt" => Some(openai::DEFAULT_MODEL),
        _ => None,
    }
}

/// Create the configured provider, reading its API key from the environment
pub fn create_provider(config: &ProviderConfig) -> ProviderResult<Arc<dyn LLMProvider>> {
    match config.name.to_lowercase().as_str() {
        "anthropic" | "claude" => {
            let client = AnthropicClient::from_env()?;
            Ok(Arc::new(configure_anthropic(client, config)))
        }
        "openai" | "gpt" => {
            let client = OpenAIClient::from_env()?;
            Ok(Arc::new(configure_openai(client, config)))
        }
        other => Err(ProviderError::Config(format!("Unknown provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_rejected() {
        let config = ProviderConfig {
            name: "grok".to_string(),
            ..Default::default()
        };
        match create_provider(&config) {
            Err(ProviderError::Config(msg)) => assert!(msg.contains("grok")),
            _ => panic!("expected a configuration error"),
        }
    }

    #[test]
    fn test_default_model_for() {
        assert_eq!(default_model_for("Claude"), Some(anthropic::DEFAULT_MODEL));
        assert_eq!(default_model_for("openai"), Some("gpt-4o-mini"));
        assert_eq!(default_model_for("grok"), None);
    }

    #[test]
    fn test_configure_openai_applies_model() {
        let config = ProviderConfig {
            model: "gpt-4o".to_string(),
            rpm: 12,
            ..Default::default()
        };
        let client = configure_openai(OpenAIClient::new("key".to_string()), &config);
        assert_eq!(client.default_model(), "gpt-4o");
        assert_eq!(client.rate_limiter().requests_per_minute(), 12);
    }
}
