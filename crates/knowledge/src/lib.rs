//! Retrieval and grounded answering.
//!
//! `embeddings` turns queries into vectors, `search` runs hybrid queries
//! against an index, and `rag` ties both to a chat model.

pub mod embeddings;
pub mod rag;
pub mod search;

#[cfg(test)]
mod tests;

pub use embeddings::{create_provider, EmbeddingClient};
pub use rag::{
    AnswerEvent, AnswerStream, ChatAnswer, Completion, DeferredCompletion, ExtraInfo,
    IdentityClaims, OrchestratorConfig, RagOrchestrator, RetrievalMode, RetrievalOverrides,
    SecurityFilterBuilder,
};
pub use search::{create_search_client, HybridSearchClient, RetrievedDocument, SearchRequest};
