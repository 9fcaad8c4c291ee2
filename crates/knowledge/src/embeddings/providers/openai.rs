//! OpenAI and Azure OpenAI embedding provider (`/embeddings`).

use crate::embeddings::provider::EmbeddingClient;
use grounded_core::config::EmbeddingSettings;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const AZURE_API_VERSION: &str = "2024-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Models that accept the `dimensions` parameter.
fn supports_dimensions(model: &str) -> bool {
    model.starts_with("text-embedding-3")
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider for the OpenAI embeddings API and Azure deployments.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    azure: bool,
    model: String,
    dimensions: usize,
}

impl OpenAiProvider {
    /// Create a provider; `azure-openai` requires an endpoint and uses the
    /// deployment (or model) name in the URL.
    pub fn new(settings: &EmbeddingSettings, api_key: impl Into<String>) -> AppResult<Self> {
        let azure = settings.provider == "azure-openai";

        let url = if azure {
            let endpoint = settings.endpoint.as_deref().ok_or_else(|| {
                AppError::Config("Provider 'azure-openai' requires an endpoint".to_string())
            })?;
            let deployment = settings.deployment.as_deref().unwrap_or(&settings.model);
            format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                AZURE_API_VERSION
            )
        } else {
            let base = settings.endpoint.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
            format!("{}/embeddings", base.trim_end_matches('/'))
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url,
            api_key: api_key.into(),
            azure,
            model: settings.model.clone(),
            dimensions: settings.dimensions,
        })
    }

    fn request_body<'a>(&'a self, texts: &'a [String]) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            input: texts,
            model: (!self.azure).then_some(self.model.as_str()),
            dimensions: supports_dimensions(&self.model).then_some(self.dimensions),
        }
    }
}

fn into_ordered(mut data: Vec<EmbeddingData>, expected: usize, dimensions: usize) -> AppResult<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(AppError::Retrieval(format!(
            "Embedding service returned {} vectors for {} inputs",
            data.len(),
            expected
        )));
    }

    data.sort_by_key(|d| d.index);

    data.into_iter()
        .map(|d| {
            if d.embedding.len() == dimensions {
                Ok(d.embedding)
            } else {
                Err(AppError::Retrieval(format!(
                    "Unexpected embedding dimensions: got {}, expected {}",
                    d.embedding.len(),
                    dimensions
                )))
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl EmbeddingClient for OpenAiProvider {
    fn provider_name(&self) -> &str {
        if self.azure {
            "azure-openai"
        } else {
            "openai"
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[tracing::instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.client.post(&self.url).json(&self.request_body(texts));
        let request = if self.azure {
            request.header("api-key", &self.api_key)
        } else {
            request.bearer_auth(&self.api_key)
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to send embedding request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Retrieval(format!(
                "Embedding API error ({}): {}",
                status, error_text
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse embedding response: {}", e)))?;

        tracing::debug!("Received {} embeddings", body.data.len());

        into_ordered(body.data, texts.len(), self.dimensions)
    }
}
