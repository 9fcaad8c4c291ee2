//! Stub services for orchestrator tests.

use crate::embeddings::EmbeddingClient;
use crate::rag::{OrchestratorConfig, RagOrchestrator, SecurityFilterBuilder};
use crate::search::{HybridSearchClient, RetrievedDocument, SearchRequest};
use grounded_core::{AppError, AppResult};
use grounded_llm::{
    ChatChunk, ChatCompletion, ChatMessage, ChatRole, ChatStream, CompletionClient,
    CompletionRequest, LlmUsage, TokenCounter,
};
use std::sync::{Arc, Mutex};

pub const MODEL: &str = "test-model";

/// Embedder returning a fixed unit vector and recording its inputs.
#[derive(Debug, Default)]
pub struct StubEmbedder {
    pub calls: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl EmbeddingClient for StubEmbedder {
    fn provider_name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> &str {
        "stub"
    }

    fn dimensions(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }
}

/// Search backend returning fixed documents, or failing.
#[derive(Default)]
pub struct RecordingSearch {
    pub documents: Vec<RetrievedDocument>,
    pub fail: bool,
    pub requests: Mutex<Vec<SearchRequest>>,
}

impl RecordingSearch {
    pub fn with_documents(documents: Vec<RetrievedDocument>) -> Self {
        Self {
            documents,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn last_request(&self) -> Option<SearchRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl HybridSearchClient for RecordingSearch {
    fn backend_name(&self) -> &str {
        "recording"
    }

    async fn search(&self, request: &SearchRequest) -> AppResult<Vec<RetrievedDocument>> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(AppError::Retrieval("search service unavailable".to_string()));
        }
        Ok(self.documents.clone())
    }
}

/// Completion client answering from a script.
#[derive(Default)]
pub struct ScriptedCompletion {
    pub answer: String,
    pub chunks: Vec<String>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            chunks: vec![answer.to_string()],
            ..Default::default()
        }
    }

    pub fn streaming(chunks: &[&str]) -> Self {
        Self {
            answer: chunks.concat(),
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl CompletionClient for ScriptedCompletion {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> AppResult<ChatCompletion> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(ChatCompletion {
            content: self.answer.clone(),
            role: ChatRole::Assistant,
            model: request.model.clone(),
            finish_reason: Some("stop".to_string()),
            usage: LlmUsage::new(10, 5),
        })
    }

    async fn stream(&self, request: &CompletionRequest) -> AppResult<ChatStream> {
        self.requests.lock().unwrap().push(request.clone());
        let mut items: Vec<AppResult<ChatChunk>> = self
            .chunks
            .iter()
            .map(|c| Ok(ChatChunk::delta(request.model.clone(), c.clone())))
            .collect();
        items.push(Ok(ChatChunk::finished(
            request.model.clone(),
            Some("stop".to_string()),
        )));
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Counts three tokens per message plus one per word. Knows one model.
pub struct WordCounter;

impl TokenCounter for WordCounter {
    fn token_limit(&self, model: &str, allow_fallback: bool) -> AppResult<usize> {
        match model {
            MODEL => Ok(8000),
            _ if allow_fallback => Ok(4000),
            _ => Err(AppError::UnsupportedModel(model.to_string())),
        }
    }

    fn count_message_tokens(
        &self,
        _model: &str,
        message: &ChatMessage,
        _allow_fallback: bool,
    ) -> AppResult<usize> {
        Ok(3 + message.content.to_plain_text().split_whitespace().count())
    }
}

pub fn document(id: &str, score: f64, reranker_score: Option<f64>) -> RetrievedDocument {
    RetrievedDocument {
        id: id.to_string(),
        sourcepage: format!("{}.pdf#page=1", id),
        sourcefile: format!("{}.pdf", id),
        content: format!("Content of {}", id),
        score: Some(score),
        reranker_score,
        ..Default::default()
    }
}

/// Stubs behind an orchestrator, kept for inspection.
pub struct Harness {
    pub embedder: Arc<StubEmbedder>,
    pub search: Arc<RecordingSearch>,
    pub completion: Arc<ScriptedCompletion>,
    pub orchestrator: RagOrchestrator,
}

impl Harness {
    pub fn new(search: RecordingSearch, completion: ScriptedCompletion) -> Self {
        Self::with_config(OrchestratorConfig::new(MODEL), search, completion)
    }

    pub fn with_config(
        config: OrchestratorConfig,
        search: RecordingSearch,
        completion: ScriptedCompletion,
    ) -> Self {
        let embedder = Arc::new(StubEmbedder::default());
        let search = Arc::new(search);
        let completion = Arc::new(completion);

        let orchestrator = RagOrchestrator::new(
            config,
            embedder.clone(),
            search.clone(),
            Arc::new(SecurityFilterBuilder::default()),
            completion.clone(),
            Arc::new(WordCounter),
        )
        .unwrap();

        Self {
            embedder,
            search,
            completion,
            orchestrator,
        }
    }

    pub fn embed_count(&self) -> usize {
        self.embedder.calls.lock().unwrap().len()
    }
}
