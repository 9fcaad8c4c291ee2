//! Hybrid search: request/result types, filters, and backends.

pub mod azure;
pub mod client;
pub mod filter;
pub mod memory;
pub mod scoring;
pub mod types;

pub use azure::AzureSearchClient;
pub use client::HybridSearchClient;
pub use filter::SearchFilter;
pub use memory::{CorpusEntry, InMemoryIndex};
pub use types::{sort_by_relevance, Caption, RetrievedDocument, SearchRequest};

use crate::embeddings::EmbeddingClient;
use grounded_core::config::SearchSettings;
use grounded_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// Create the configured search backend.
///
/// The in-memory backend resolves `corpusPath` against `workspace` and
/// embeds documents stored without vectors using `embedder`.
pub async fn create_search_client(
    settings: &SearchSettings,
    workspace: &Path,
    embedder: &dyn EmbeddingClient,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn HybridSearchClient>> {
    match settings.backend.as_str() {
        "memory" => {
            let corpus = settings.corpus_path.as_ref().ok_or_else(|| {
                AppError::Config("Search backend 'memory' requires corpusPath".to_string())
            })?;
            let path = if corpus.is_absolute() {
                corpus.clone()
            } else {
                workspace.join(corpus)
            };

            let mut index = InMemoryIndex::load(&path)?;
            index.embed_missing(embedder).await?;
            Ok(Arc::new(index))
        }
        "azure" => {
            let api_key = api_key.ok_or_else(|| {
                AppError::Config("Search backend 'azure' requires an API key".to_string())
            })?;
            Ok(Arc::new(AzureSearchClient::new(settings, api_key)?))
        }
        other => Err(AppError::Config(format!(
            "Unknown search backend: '{}'. Supported backends: memory, azure",
            other
        ))),
    }
}
