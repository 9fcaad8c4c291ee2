//! In-memory hybrid search index.
//!
//! Loads a corpus of pre-chunked documents from JSON and answers hybrid
//! queries: BM25 for text, cosine similarity for vectors, a weighted mean of
//! the two normalized scores when both are used, and a term-overlap semantic
//! re-ranker with extractive captions.

use super::client::HybridSearchClient;
use super::scoring::{
    best_caption, cosine_similarity, fuse_scores, rerank_score, tokenize, Bm25,
};
use super::types::{sort_by_relevance, Caption, RetrievedDocument, SearchRequest};
use crate::embeddings::EmbeddingClient;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One corpus record: a document plus its optional embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    #[serde(flatten)]
    pub document: RetrievedDocument,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Hybrid search over documents held in memory.
#[derive(Debug)]
pub struct InMemoryIndex {
    entries: Vec<CorpusEntry>,
    bm25: Bm25,
}

impl InMemoryIndex {
    pub fn new(mut entries: Vec<CorpusEntry>) -> Self {
        for entry in &mut entries {
            entry.document.score = None;
            entry.document.reranker_score = None;
            entry.document.captions.clear();
        }
        let bm25 = Bm25::new(entries.iter().map(|e| e.document.content.as_str()));
        Self { entries, bm25 }
    }

    /// Load a corpus from a `.json` array, a `.jsonl` file, or a directory
    /// of such files.
    pub fn load(path: &Path) -> AppResult<Self> {
        let entries = if path.is_dir() {
            let mut entries = Vec::new();
            let mut files: Vec<_> = walkdir::WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_corpus_file(e.path()))
                .map(|e| e.into_path())
                .collect();
            files.sort();
            for file in files {
                entries.extend(read_corpus_file(&file)?);
            }
            entries
        } else {
            read_corpus_file(path)?
        };

        tracing::info!("Loaded {} documents from {:?}", entries.len(), path);
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embed documents that carry no embedding. Returns how many were
    /// embedded.
    pub async fn embed_missing(&mut self, client: &dyn EmbeddingClient) -> AppResult<usize> {
        let missing: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.embedding.is_none())
            .map(|(i, _)| i)
            .collect();

        if missing.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = missing
            .iter()
            .map(|i| self.entries[*i].document.content.clone())
            .collect();
        let vectors = client.embed_batch(&texts).await?;

        if vectors.len() != missing.len() {
            return Err(AppError::Retrieval(format!(
                "Embedding client returned {} vectors for {} documents",
                vectors.len(),
                missing.len()
            )));
        }

        for (i, vector) in missing.iter().zip(vectors) {
            self.entries[*i].embedding = Some(vector);
        }

        tracing::debug!(
            "Embedded {} documents with {}",
            missing.len(),
            client.model_name()
        );
        Ok(missing.len())
    }

    fn text_ranking(&self, candidates: &[usize], query: &str) -> Vec<(usize, f64)> {
        let terms = tokenize(query);
        let mut scored: Vec<(usize, f64)> = candidates
            .iter()
            .map(|i| (*i, self.bm25.score(*i, &terms)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        sort_desc(&mut scored);

        // Scale to [0, 1] so thresholds behave like the other modes
        let max = scored.first().map(|(_, s)| *s).unwrap_or(0.0);
        if max > 0.0 {
            scored.iter_mut().for_each(|(_, s)| *s /= max);
        }
        scored
    }

    fn vector_ranking(&self, candidates: &[usize], vectors: &[Vec<f32>]) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = candidates
            .iter()
            .filter_map(|i| {
                let embedding = self.entries[*i].embedding.as_ref()?;
                let best = vectors
                    .iter()
                    .map(|v| cosine_similarity(v, embedding))
                    .fold(0.0f64, f64::max);
                Some((*i, best.clamp(0.0, 1.0)))
            })
            .filter(|(_, s)| *s > 0.0)
            .collect();
        sort_desc(&mut scored);
        scored
    }
}

fn sort_desc(scored: &mut [(usize, f64)]) {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
}

fn is_corpus_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonl")
    )
}

fn read_corpus_file(path: &Path) -> AppResult<Vec<CorpusEntry>> {
    let contents = std::fs::read_to_string(path)?;

    let parse_error = |e: serde_json::Error| {
        AppError::Retrieval(format!("Failed to parse corpus file {:?}: {}", path, e))
    };

    if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(parse_error))
            .collect()
    } else {
        serde_json::from_str(&contents).map_err(parse_error)
    }
}

#[async_trait::async_trait]
impl HybridSearchClient for InMemoryIndex {
    fn backend_name(&self) -> &str {
        "memory"
    }

    #[tracing::instrument(skip(self, request), fields(top = request.top))]
    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<RetrievedDocument>> {
        let candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                request
                    .filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&e.document))
            })
            .map(|(i, _)| i)
            .collect();

        let text_query = request.query_text.as_deref().filter(|_| request.use_text);
        let text = text_query.map(|q| self.text_ranking(&candidates, q));
        let vector = (request.use_vector && !request.vectors.is_empty())
            .then(|| self.vector_ranking(&candidates, &request.vectors));

        let scored: Vec<(usize, f64)> = match (text, vector) {
            (Some(text), Some(vector)) => fuse_scores(&text, &vector),
            (Some(ranking), None) | (None, Some(ranking)) => ranking,
            (None, None) => Vec::new(),
        };

        tracing::debug!(
            candidates = candidates.len(),
            matched = scored.len(),
            "Scored in-memory documents"
        );

        let semantic_query = request.query_text.as_deref().filter(|_| request.semantic_enabled());

        let mut results: Vec<RetrievedDocument> = scored
            .into_iter()
            .map(|(i, score)| {
                let mut document = self.entries[i].document.clone();
                document.score = Some(score);
                if let Some(query) = semantic_query {
                    document.reranker_score = Some(rerank_score(query, &document.content));
                    if request.use_semantic_captions {
                        document.captions = best_caption(query, &document.content)
                            .map(|text| vec![Caption::new(text)])
                            .unwrap_or_default();
                    }
                }
                document
            })
            .collect();

        sort_by_relevance(&mut results);
        results.retain(|d| {
            d.meets_thresholds(request.minimum_search_score, request.minimum_reranker_score)
        });
        results.truncate(request.top);

        Ok(results)
    }
}
