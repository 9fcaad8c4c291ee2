//! Hybrid search client trait.

use super::types::{RetrievedDocument, SearchRequest};
use grounded_core::AppResult;

/// A search service combining lexical and vector retrieval.
///
/// Implementations return documents sorted by relevance descending, at most
/// `request.top` of them, and drop documents below either minimum score.
/// Failures are reported as `AppError::Retrieval`.
#[async_trait::async_trait]
pub trait HybridSearchClient: Send + Sync {
    /// Backend name (e.g., "memory", "azure")
    fn backend_name(&self) -> &str;

    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<RetrievedDocument>>;
}
