//! Search request and result types.

use super::filter::SearchFilter;
use serde::{Deserialize, Serialize};

/// Extractive caption produced by semantic ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub text: String,

    /// Caption text with highlighted terms, when the backend returns it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<String>,
}

impl Caption {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlights: None,
        }
    }
}

/// A document returned by a search backend.
///
/// Read-only once returned; the serialized form is what the
/// "Search results" thought step records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,

    /// Source identifier cited by the model (e.g. `handbook.pdf#page=3`)
    pub sourcepage: String,

    /// Original file the passage came from
    #[serde(default)]
    pub sourcefile: String,

    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Object ids allowed to see the document
    #[serde(default)]
    pub oids: Vec<String>,

    /// Group ids allowed to see the document
    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub captions: Vec<Caption>,

    /// Retrieval score (lexical, vector or fused)
    #[serde(default)]
    pub score: Option<f64>,

    /// Semantic ranker score on a 0-4 scale
    #[serde(default)]
    pub reranker_score: Option<f64>,
}

impl RetrievedDocument {
    /// Whether the document clears both relevance thresholds.
    ///
    /// A missing score counts as zero, so any positive threshold excludes it.
    pub fn meets_thresholds(&self, minimum_search_score: f64, minimum_reranker_score: f64) -> bool {
        self.score.unwrap_or(0.0) >= minimum_search_score
            && self.reranker_score.unwrap_or(0.0) >= minimum_reranker_score
    }

    /// Score used for ordering: the reranker score when present, else the
    /// retrieval score.
    pub fn relevance(&self) -> f64 {
        self.reranker_score.or(self.score).unwrap_or(0.0)
    }

    /// Text cited for this document: joined captions when requested and
    /// available, else the content.
    pub fn citation_text(&self, use_captions: bool) -> String {
        if use_captions && !self.captions.is_empty() {
            self.captions
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" . ")
        } else {
            self.content.clone()
        }
    }
}

/// Sort documents by relevance descending; ties keep their input order.
pub fn sort_by_relevance(documents: &mut [RetrievedDocument]) {
    documents.sort_by(|a, b| {
        b.relevance()
            .partial_cmp(&a.relevance())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// One hybrid search call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    /// Maximum number of documents to return
    pub top: usize,

    /// Lexical query; `None` when text search is disabled
    pub query_text: Option<String>,

    pub filter: Option<SearchFilter>,

    /// Query vectors; empty when vector search is disabled
    pub vectors: Vec<Vec<f32>>,

    pub use_text: bool,
    pub use_vector: bool,
    pub use_semantic_ranker: bool,
    pub use_semantic_captions: bool,

    pub minimum_search_score: f64,
    pub minimum_reranker_score: f64,
}

impl SearchRequest {
    /// Semantic ranking needs a text query to rank against.
    pub fn semantic_enabled(&self) -> bool {
        self.use_semantic_ranker && self.query_text.is_some()
    }
}
