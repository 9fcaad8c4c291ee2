//! OpenAI and Azure OpenAI chat provider.
//!
//! Speaks the `chat/completions` API. Azure OpenAI differs only in URL shape
//! (`/openai/deployments/{deployment}/chat/completions?api-version=...`) and
//! authentication header (`api-key` instead of a bearer token); the request's
//! `model` field names the deployment there.

use crate::client::{
    ChatChunk, ChatCompletion, ChatMessage, ChatRole, ChatStream, CompletionClient,
    CompletionRequest, LlmUsage,
};
use crate::lines::byte_lines;
use futures::{Stream, StreamExt};
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OpenAI endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Azure OpenAI API version used for chat requests.
pub const AZURE_API_VERSION: &str = "2024-06-01";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest silence tolerated between response bytes. Streams have no overall
/// deadline.
const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Which flavour of the API to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ApiFlavor {
    OpenAi,
    Azure,
}

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    n: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    role: ChatRole,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunkBody {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    role: Option<ChatRole>,
    #[serde(default)]
    content: Option<String>,
}

/// One decoded server-sent event line.
#[derive(Debug, PartialEq)]
enum SseLine {
    /// A chunk carrying a choice
    Chunk(ChatChunk),
    /// `data: [DONE]`
    Done,
    /// Comments, blank lines, and chunks without choices (Azure content
    /// filter annotations)
    Skip,
}

/// OpenAI-compatible chat client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    flavor: ApiFlavor,
    client: reqwest::Client,
}

fn http_client(connect: Duration, read: Duration) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect)
        .read_timeout(read)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))
}

impl OpenAiClient {
    /// Client for api.openai.com or a compatible endpoint.
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> AppResult<Self> {
        Self::build(
            api_key.into(),
            base_url.unwrap_or(DEFAULT_OPENAI_URL),
            ApiFlavor::OpenAi,
        )
    }

    /// Client for an Azure OpenAI resource endpoint.
    pub fn azure(api_key: impl Into<String>, endpoint: &str) -> AppResult<Self> {
        Self::build(api_key.into(), endpoint, ApiFlavor::Azure)
    }

    fn build(api_key: String, base_url: &str, flavor: ApiFlavor) -> AppResult<Self> {
        let client = http_client(CONNECT_TIMEOUT, READ_TIMEOUT)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            flavor,
            client,
        })
    }

    fn url_for(&self, model: &str) -> String {
        match self.flavor {
            ApiFlavor::OpenAi => format!("{}/chat/completions", self.base_url),
            ApiFlavor::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.base_url, model, AZURE_API_VERSION
            ),
        }
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> AppResult<reqwest::Response> {
        let body = ChatRequestBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            n: request.n,
            stream,
            seed: request.seed,
        };

        let builder = self.client.post(self.url_for(&request.model)).json(&body);
        let builder = match self.flavor {
            ApiFlavor::OpenAi => builder.bearer_auth(&self.api_key),
            ApiFlavor::Azure => builder.header("api-key", &self.api_key),
        };

        let response = builder.send().await.map_err(|e| {
            AppError::Completion(format!("Failed to send chat request: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Completion(format!(
                "Chat API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }
}

fn parse_sse_line(line: &str) -> AppResult<SseLine> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseLine::Skip);
    };
    let data = data.trim();

    if data == "[DONE]" {
        return Ok(SseLine::Done);
    }
    if data.is_empty() {
        return Ok(SseLine::Skip);
    }

    let body: StreamChunkBody = serde_json::from_str(data)
        .map_err(|e| AppError::Completion(format!("Failed to parse chunk: {}", e)))?;

    let Some(choice) = body.choices.into_iter().next() else {
        return Ok(SseLine::Skip);
    };

    Ok(SseLine::Chunk(ChatChunk {
        content: choice.delta.content.unwrap_or_default(),
        role: choice.delta.role,
        model: body.model,
        done: false,
        finish_reason: choice.finish_reason,
        usage: body.usage,
    }))
}

struct SseState<S> {
    lines: S,
    model: String,
    finish_reason: Option<String>,
    finished: bool,
}

/// Turn SSE lines into chunks; `[DONE]` becomes the terminal chunk and a body
/// that ends without it yields an error.
fn sse_chunks<S>(lines: S, model: String) -> impl Stream<Item = AppResult<ChatChunk>> + Send
where
    S: Stream<Item = AppResult<String>> + Send + Unpin + 'static,
{
    let state = SseState {
        lines,
        model,
        finish_reason: None,
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        if state.finished {
            return None;
        }

        loop {
            let line = match state.lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.finished = true;
                    return Some((
                        Err(AppError::Completion(
                            "Stream ended before the completion marker".to_string(),
                        )),
                        state,
                    ));
                }
            };

            match parse_sse_line(&line) {
                Ok(SseLine::Skip) => continue,
                Ok(SseLine::Done) => {
                    state.finished = true;
                    let chunk = ChatChunk::finished(state.model.clone(), state.finish_reason.take());
                    return Some((Ok(chunk), state));
                }
                Ok(SseLine::Chunk(chunk)) => {
                    if !chunk.model.is_empty() {
                        state.model = chunk.model.clone();
                    }
                    if chunk.finish_reason.is_some() {
                        state.finish_reason = chunk.finish_reason.clone();
                    }
                    return Some((Ok(chunk), state));
                }
                Err(e) => {
                    state.finished = true;
                    return Some((Err(e), state));
                }
            }
        }
    })
}

#[async_trait::async_trait]
impl CompletionClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        match self.flavor {
            ApiFlavor::OpenAi => "openai",
            ApiFlavor::Azure => "azure-openai",
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> AppResult<ChatCompletion> {
        tracing::info!(model = %request.model, provider = self.provider_name(), "Sending chat request");

        let response = self.send(request, false).await?;
        let body: ChatResponseBody = response
            .json()
            .await
            .map_err(|e| AppError::Completion(format!("Failed to parse chat response: {}", e)))?;

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            AppError::Completion("Chat response contained no choices".to_string())
        })?;

        Ok(ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            role: choice.message.role,
            model: body.model,
            finish_reason: choice.finish_reason,
            usage: body.usage.unwrap_or_default(),
        })
    }

    async fn stream(&self, request: &CompletionRequest) -> AppResult<ChatStream> {
        tracing::info!(model = %request.model, provider = self.provider_name(), "Starting streaming chat request");

        let response = self.send(request, true).await?;
        let lines = byte_lines(Box::pin(response.bytes_stream()));

        Ok(Box::pin(sse_chunks(Box::pin(lines), request.model.clone())))
    }
}
