//! Embedding client trait and factory.

use super::providers::{OllamaProvider, OpenAiProvider, TrigramProvider};
use grounded_core::config::EmbeddingSettings;
use grounded_core::{AppError, AppResult};
use std::sync::Arc;

/// Trait for query embedding services.
///
/// Every vector returned by one client has the same length. Failures are
/// reported as `AppError::Retrieval`.
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "openai", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Retrieval("No embedding returned".to_string()))
    }
}

/// Create an embedding client from the embedding settings.
pub fn create_provider(
    settings: &EmbeddingSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingClient>> {
    tracing::debug!(
        provider = %settings.provider,
        model = %settings.model,
        dimensions = settings.dimensions,
        "Creating embedding client"
    );

    match settings.provider.as_str() {
        "trigram" => Ok(Arc::new(TrigramProvider::new(settings.dimensions))),

        "ollama" => Ok(Arc::new(OllamaProvider::new(settings)?)),

        "openai" | "azure-openai" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config(format!(
                    "Embedding provider '{}' requires an API key",
                    settings.provider
                ))
            })?;
            Ok(Arc::new(OpenAiProvider::new(settings, api_key)?))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama, openai, azure-openai",
            settings.provider
        ))),
    }
}
