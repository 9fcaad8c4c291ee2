//! Retrieval stage: embed, filter, search, assemble.

use super::access::AccessFilterBuilder;
use super::context::AssembledContext;
use super::overrides::RetrievalOverrides;
use super::types::{ExtraInfo, IdentityClaims, ThoughtStep};
use crate::embeddings::EmbeddingClient;
use crate::search::{sort_by_relevance, HybridSearchClient, SearchRequest};
use grounded_core::AppResult;
use std::sync::Arc;

/// Runs retrieval for one query.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    search: Arc<dyn HybridSearchClient>,
    filter_builder: Arc<dyn AccessFilterBuilder>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        search: Arc<dyn HybridSearchClient>,
        filter_builder: Arc<dyn AccessFilterBuilder>,
    ) -> Self {
        Self {
            embedder,
            search,
            filter_builder,
        }
    }

    /// Build the search request for `query`, embedding it when vector
    /// search is enabled.
    pub async fn search_request(
        &self,
        query: &str,
        overrides: &RetrievalOverrides,
        claims: &IdentityClaims,
    ) -> AppResult<SearchRequest> {
        let use_text = overrides.use_text();
        let use_vector = overrides.use_vector();

        let vectors = if use_vector {
            vec![self.embedder.embed(query).await?]
        } else {
            Vec::new()
        };

        let filter = self.filter_builder.build_filter(overrides, claims)?;

        Ok(SearchRequest {
            top: overrides.top(),
            query_text: use_text.then(|| query.to_string()),
            filter,
            vectors,
            use_text,
            use_vector,
            use_semantic_ranker: overrides.semantic_ranker,
            use_semantic_captions: overrides.semantic_captions,
            minimum_search_score: overrides.minimum_search_score(),
            minimum_reranker_score: overrides.minimum_reranker_score(),
        })
    }

    /// Retrieve sources for `query`.
    ///
    /// Returns the joined context text and an `ExtraInfo` holding the
    /// formatted sources under `"text"` and a "Search results" step.
    /// Backends are expected to honour `top` and both thresholds; results
    /// are checked again here so a lenient backend cannot leak documents
    /// past them.
    #[tracing::instrument(skip_all, fields(backend = self.search.backend_name()))]
    pub async fn retrieve(
        &self,
        query: &str,
        overrides: &RetrievalOverrides,
        claims: &IdentityClaims,
    ) -> AppResult<(String, ExtraInfo)> {
        let request = self.search_request(query, overrides, claims).await?;

        let mut results = self.search.search(&request).await?;
        let returned = results.len();
        results.retain(|d| {
            d.meets_thresholds(request.minimum_search_score, request.minimum_reranker_score)
        });
        sort_by_relevance(&mut results);
        results.truncate(request.top);

        if results.len() < returned {
            tracing::debug!(
                "Dropped {} documents outside top/thresholds",
                returned - results.len()
            );
        }
        tracing::info!("Retrieved {} documents", results.len());

        let context = AssembledContext::from_documents(&results, overrides.semantic_captions);
        let content = context.content();

        let extra_info = ExtraInfo::new()
            .with_data_points("text", context.sources)
            .with_thought(ThoughtStep::new(
                "Search results",
                serde_json::to_value(&results)?,
            ));

        Ok((content, extra_info))
    }
}
