//! Chat provider factory.
//!
//! Creates completion clients from the chat section of the application
//! configuration, resolving endpoints and secrets.

use crate::client::CompletionClient;
use crate::providers::ollama::DEFAULT_OLLAMA_URL;
use crate::providers::{OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use grounded_core::config::ChatSettings;
use grounded_core::{AppError, AppResult};
use std::sync::Arc;

/// Create a completion client for the configured chat provider.
///
/// # Arguments
/// * `settings` - Chat settings (provider, endpoint)
/// * `api_key` - API key for providers that require it
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown, a required secret
/// or endpoint is missing, or the HTTP client cannot be built.
pub fn create_client(
    settings: &ChatSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn CompletionClient>> {
    let provider = ProviderType::parse(&settings.provider)
        .ok_or_else(|| AppError::Config(format!("Unknown provider: {}", settings.provider)))?;

    let api_key = match (provider.requires_api_key(), api_key) {
        (true, None) => {
            return Err(AppError::Config(format!(
                "Provider '{}' requires an API key",
                provider.as_str()
            )))
        }
        (_, key) => key.unwrap_or_default(),
    };

    match provider {
        ProviderType::Ollama => {
            let base_url = settings.endpoint.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
            Ok(Arc::new(OllamaClient::with_base_url(base_url)))
        }
        ProviderType::OpenAI => Ok(Arc::new(OpenAiClient::new(
            api_key,
            settings.endpoint.as_deref(),
        )?)),
        ProviderType::AzureOpenAI => {
            let endpoint = settings.endpoint.as_deref().ok_or_else(|| {
                AppError::Config("Provider 'azure-openai' requires an endpoint".to_string())
            })?;
            Ok(Arc::new(OpenAiClient::azure(api_key, endpoint)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> ChatSettings {
        ChatSettings {
            provider: provider.to_string(),
            ..ChatSettings::default()
        }
    }

    #[test]
    fn test_create_ollama_client() {
        let client = create_client(&settings("ollama"), None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_openai_requires_api_key() {
        match create_client(&settings("openai"), None) {
            Err(err) => assert!(err.to_string().contains("requires an API key")),
            Ok(_) => panic!("Expected error for OpenAI without API key"),
        }
    }

    #[test]
    fn test_azure_requires_endpoint() {
        match create_client(&settings("azure-openai"), Some("key")) {
            Err(err) => assert!(err.to_string().contains("requires an endpoint")),
            Ok(_) => panic!("Expected error for Azure without endpoint"),
        }
    }

    #[test]
    fn test_create_azure_client() {
        let mut azure = settings("azure-openai");
        azure.endpoint = Some("https://res.openai.azure.com".to_string());
        let client = create_client(&azure, Some("key")).unwrap();
        assert_eq!(client.provider_name(), "azure-openai");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client(&settings("unknown"), None) {
            Err(err) => assert!(err.to_string().contains("Unknown provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
