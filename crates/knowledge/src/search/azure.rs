//! Azure AI Search client.
//!
//! Talks to the `docs/search` REST endpoint: lexical query, vector queries
//! against the `embedding` field, semantic ranking with extractive captions,
//! query language and speller.

use super::client::HybridSearchClient;
use super::types::{sort_by_relevance, Caption, RetrievedDocument, SearchRequest};
use grounded_core::config::SearchSettings;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// REST API version.
pub const SEARCH_API_VERSION: &str = "2023-11-01";

/// Nearest neighbours requested per vector query.
const VECTOR_K: usize = 50;

const VECTOR_FIELD: &str = "embedding";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    search: &'a str,
    top: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    vector_queries: Vec<VectorQuery<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    semantic_configuration: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    captions: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_language: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speller: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct VectorQuery<'a> {
    kind: &'static str,
    vector: &'a [f32],
    k: usize,
    fields: &'static str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "@search.score", default)]
    score: Option<f64>,
    #[serde(rename = "@search.rerankerScore", default)]
    reranker_score: Option<f64>,
    #[serde(rename = "@search.captions", default)]
    captions: Option<Vec<Caption>>,
    #[serde(flatten)]
    document: RetrievedDocument,
}

/// Azure AI Search index client.
pub struct AzureSearchClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
    query_language: String,
    query_speller: String,
    semantic_configuration: String,
}

impl AzureSearchClient {
    pub fn new(settings: &SearchSettings, api_key: impl Into<String>) -> AppResult<Self> {
        let (endpoint, index) = match (&settings.endpoint, &settings.index) {
            (Some(endpoint), Some(index)) => (endpoint, index),
            _ => {
                return Err(AppError::Config(
                    "Search backend 'azure' requires endpoint and index".to_string(),
                ))
            }
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!(
                "{}/indexes/{}/docs/search?api-version={}",
                endpoint.trim_end_matches('/'),
                index,
                SEARCH_API_VERSION
            ),
            api_key: api_key.into(),
            query_language: settings.query_language.clone(),
            query_speller: settings.query_speller.clone(),
            semantic_configuration: settings.semantic_configuration.clone(),
        })
    }

    fn body<'a>(&'a self, request: &'a SearchRequest) -> SearchBody<'a> {
        let query_text = request
            .query_text
            .as_deref()
            .filter(|_| request.use_text)
            .unwrap_or("");

        let vector_queries = if request.use_vector {
            request
                .vectors
                .iter()
                .map(|vector| VectorQuery {
                    kind: "vector",
                    vector,
                    k: VECTOR_K,
                    fields: VECTOR_FIELD,
                })
                .collect()
        } else {
            Vec::new()
        };

        let semantic = request.semantic_enabled() && request.use_text;

        SearchBody {
            search: query_text,
            top: request.top,
            filter: request.filter.as_ref().map(|f| f.to_odata()),
            vector_queries,
            query_type: semantic.then_some("semantic"),
            semantic_configuration: semantic.then_some(self.semantic_configuration.as_str()),
            captions: (semantic && request.use_semantic_captions)
                .then_some("extractive|highlight-false"),
            query_language: semantic.then_some(self.query_language.as_str()),
            speller: semantic.then_some(self.query_speller.as_str()),
        }
    }
}

fn into_documents(response: SearchResponse, request: &SearchRequest) -> Vec<RetrievedDocument> {
    let mut documents: Vec<RetrievedDocument> = response
        .value
        .into_iter()
        .map(|hit| {
            let mut document = hit.document;
            document.score = hit.score;
            document.reranker_score = hit.reranker_score;
            document.captions = hit.captions.unwrap_or_default();
            document
        })
        .filter(|d| d.meets_thresholds(request.minimum_search_score, request.minimum_reranker_score))
        .collect();

    sort_by_relevance(&mut documents);
    documents.truncate(request.top);
    documents
}

#[async_trait::async_trait]
impl HybridSearchClient for AzureSearchClient {
    fn backend_name(&self) -> &str {
        "azure"
    }

    #[tracing::instrument(skip(self, request), fields(top = request.top))]
    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<RetrievedDocument>> {
        let body = self.body(request);
        tracing::debug!(
            vector_queries = body.vector_queries.len(),
            semantic = body.query_type.is_some(),
            "Sending search request"
        );

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to send search request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Retrieval(format!(
                "Search API error ({}): {}",
                status, error_text
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse search response: {}", e)))?;

        let documents = into_documents(parsed, request);
        tracing::info!("Search returned {} documents", documents.len());
        Ok(documents)
    }
}
