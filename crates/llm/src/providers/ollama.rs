//! Ollama chat provider implementation.
//!
//! This module provides integration with Ollama, a local LLM runtime.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{
    ChatChunk, ChatCompletion, ChatMessage, ChatRole, ChatStream, CompletionClient,
    CompletionRequest, LlmUsage,
};
use crate::lines::byte_lines;
use futures::StreamExt;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Ollama chat request format.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "OllamaOptions::is_empty")]
    options: OllamaOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: ChatRole,
    content: String,
}

#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

impl OllamaOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none() && self.seed.is_none()
    }
}

/// Ollama chat response format (one object, or one line per streamed chunk).
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    #[serde(default)]
    message: Option<OllamaMessage>,
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

impl OllamaChatResponse {
    fn usage(&self) -> LlmUsage {
        LlmUsage::new(
            self.prompt_eval_count.unwrap_or(0),
            self.eval_count.unwrap_or(0),
        )
    }
}

/// Ollama chat client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Convert a completion request to Ollama format.
    fn to_ollama_request(&self, request: &CompletionRequest, stream: bool) -> OllamaChatRequest {
        if request.n != 1 {
            tracing::debug!("Ollama ignores n={}, generating one choice", request.n);
        }

        OllamaChatRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(to_ollama_message).collect(),
            stream,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                seed: request.seed,
            },
        }
    }

    async fn send(&self, body: &OllamaChatRequest) -> AppResult<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Completion(format!("Failed to send request to Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Completion(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

fn to_ollama_message(message: &ChatMessage) -> OllamaMessage {
    OllamaMessage {
        role: message.role,
        content: message.content.to_plain_text(),
    }
}

fn parse_chunk(line: &str) -> AppResult<ChatChunk> {
    let response: OllamaChatResponse = serde_json::from_str(line)
        .map_err(|e| AppError::Completion(format!("Failed to parse chunk: {}", e)))?;

    let usage = response.done.then(|| response.usage());
    let (role, content) = match response.message {
        Some(message) => (Some(message.role), message.content),
        None => (None, String::new()),
    };

    Ok(ChatChunk {
        content,
        role,
        model: response.model,
        done: response.done,
        finish_reason: response.done_reason,
        usage,
    })
}

#[async_trait::async_trait]
impl CompletionClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &CompletionRequest) -> AppResult<ChatCompletion> {
        tracing::info!(model = %request.model, "Sending chat request to Ollama");
        tracing::debug!("Request: {:?}", request);

        let body = self.to_ollama_request(request, false);
        let response = self.send(&body).await?;

        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Completion(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::info!("Received completion from Ollama");

        let usage = ollama_response.usage();
        let message = ollama_response.message.ok_or_else(|| {
            AppError::Completion("Ollama response did not contain a message".to_string())
        })?;

        Ok(ChatCompletion {
            content: message.content,
            role: message.role,
            model: ollama_response.model,
            finish_reason: ollama_response.done_reason,
            usage,
        })
    }

    async fn stream(&self, request: &CompletionRequest) -> AppResult<ChatStream> {
        tracing::info!(model = %request.model, "Starting streaming chat request to Ollama");
        tracing::debug!("Request: {:?}", request);

        let body = self.to_ollama_request(request, true);
        let response = self.send(&body).await?;

        // Ollama sends newline-delimited JSON, the last object has done=true
        let stream = byte_lines(Box::pin(response.bytes_stream()))
            .filter(|line| {
                let keep = !matches!(line, Ok(l) if l.trim().is_empty());
                async move { keep }
            })
            .map(|line| line.and_then(|l| parse_chunk(&l)));

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::with_base_url("http://localhost:11434/");
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_ollama_request_conversion() {
        let client = OllamaClient::new();
        let request = CompletionRequest::new(
            "llama3.2",
            vec![ChatMessage::system("Be brief"), ChatMessage::user("Hello")],
        )
        .with_temperature(0.3)
        .with_max_tokens(1024)
        .with_seed(Some(42));

        let ollama_req = client.to_ollama_request(&request, false);
        assert_eq!(ollama_req.model, "llama3.2");
        assert_eq!(ollama_req.messages.len(), 2);
        assert_eq!(ollama_req.messages[1].content, "Hello");
        assert_eq!(ollama_req.options.temperature, Some(0.3));
        assert_eq!(ollama_req.options.num_predict, Some(1024));
        assert_eq!(ollama_req.options.seed, Some(42));
    }

    #[test]
    fn test_options_omitted_when_empty() {
        let client = OllamaClient::new();
        let request = CompletionRequest::new("llama3.2", vec![ChatMessage::user("Hi")]);
        let value = serde_json::to_value(client.to_ollama_request(&request, true)).unwrap();
        assert!(value.get("options").is_none());
        assert_eq!(value["stream"], true);
    }

    #[test]
    fn test_parse_stream_chunks() {
        let delta = parse_chunk(
            r#"{"model":"llama3.2","message":{"role":"assistant","content":"Hal"},"done":false}"#,
        )
        .unwrap();
        assert_eq!(delta.content, "Hal");
        assert!(!delta.done);
        assert!(delta.usage.is_none());

        let last = parse_chunk(
            r#"{"model":"llama3.2","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop","prompt_eval_count":12,"eval_count":3}"#,
        )
        .unwrap();
        assert!(last.done);
        assert_eq!(last.finish_reason.as_deref(), Some("stop"));
        assert_eq!(last.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_invalid_chunk() {
        assert!(matches!(
            parse_chunk("not json"),
            Err(AppError::Completion(_))
        ));
    }
}
