//! Retrieval-augmented answer orchestration.
//!
//! Per request: validate the last message, retrieve sources unless
//! retrieval is disabled, render the system prompt, fit the conversation
//! into the model's token budget and prepare the completion call. The call
//! itself is returned unstarted.

use super::access::AccessFilterBuilder;
use super::context::user_turn;
use super::deferred::DeferredCompletion;
use super::overrides::RetrievalOverrides;
use super::retrieval::Retriever;
use super::types::{ExtraInfo, IdentityClaims, ThoughtStep};
use crate::embeddings::EmbeddingClient;
use crate::search::HybridSearchClient;
use grounded_core::{AppError, AppResult};
use grounded_llm::{ChatMessage, ChatRole, CompletionClient, CompletionRequest, TokenCounter};
use grounded_prompt::{build_messages, MessageRequest, SystemPromptBuilder};
use std::sync::Arc;

/// Tokens reserved for the generated answer.
pub const RESPONSE_TOKEN_LIMIT: u32 = 1024;

/// Chat model selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Model name used for token accounting
    pub chat_model: String,

    /// Deployment name sent instead of the model when set
    pub chat_deployment: Option<String>,

    /// Use the default token accounting for unrecognized models
    pub allow_non_gpt_models: bool,
}

impl OrchestratorConfig {
    pub fn new(chat_model: impl Into<String>) -> Self {
        Self {
            chat_model: chat_model.into(),
            chat_deployment: None,
            allow_non_gpt_models: true,
        }
    }

    /// Identifier sent with the completion request.
    pub fn completion_model(&self) -> &str {
        self.chat_deployment.as_deref().unwrap_or(&self.chat_model)
    }
}

/// Coordinates retrieval, prompt assembly and completion.
pub struct RagOrchestrator {
    config: OrchestratorConfig,
    retriever: Retriever,
    completion: Arc<dyn CompletionClient>,
    token_counter: Arc<dyn TokenCounter>,
    system_prompt: SystemPromptBuilder,
    token_limit: usize,
}

impl RagOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Errors
    /// `UnsupportedModel` when the chat model has no known token limit and
    /// non-GPT models are not allowed.
    pub fn new(
        config: OrchestratorConfig,
        embedder: Arc<dyn EmbeddingClient>,
        search: Arc<dyn HybridSearchClient>,
        filter_builder: Arc<dyn AccessFilterBuilder>,
        completion: Arc<dyn CompletionClient>,
        token_counter: Arc<dyn TokenCounter>,
    ) -> AppResult<Self> {
        let token_limit =
            token_counter.token_limit(&config.chat_model, config.allow_non_gpt_models)?;

        tracing::debug!(
            model = %config.chat_model,
            token_limit,
            "Created RAG orchestrator"
        );

        Ok(Self {
            config,
            retriever: Retriever::new(embedder, search, filter_builder),
            completion,
            token_counter,
            system_prompt: SystemPromptBuilder::new(),
            token_limit,
        })
    }

    /// Use a different system prompt template.
    pub fn with_system_prompt(mut self, system_prompt: SystemPromptBuilder) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Context window of the chat model.
    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// Retrieve sources for `query` without generating an answer.
    pub async fn retrieve(
        &self,
        query: &str,
        overrides: &RetrievalOverrides,
        claims: &IdentityClaims,
    ) -> AppResult<(String, ExtraInfo)> {
        overrides.validate()?;
        self.retriever.retrieve(query, overrides, claims).await
    }

    /// Prepare an answer for the conversation.
    ///
    /// Returns the trace gathered so far and the unstarted completion call.
    /// Retrieval failures propagate as they are; nothing is retried.
    #[tracing::instrument(skip_all, fields(messages = messages.len(), streaming = streaming))]
    pub async fn answer(
        &self,
        messages: &[ChatMessage],
        overrides: &RetrievalOverrides,
        claims: &IdentityClaims,
        streaming: bool,
    ) -> AppResult<(ExtraInfo, DeferredCompletion)> {
        let query = last_user_query(messages)?;
        overrides.validate()?;

        let apply_retrieval = overrides.apply_retrieval();
        let mut extra_info = ExtraInfo::new();
        let mut content = String::new();

        if apply_retrieval {
            let (sources, retrieval_info) = self.retriever.retrieve(query, overrides, claims).await?;
            content = sources;
            extra_info = extra_info.merge(retrieval_info);
        } else {
            tracing::info!("Retrieval disabled for this request");
        }

        let system_prompt = self.system_prompt.render(
            overrides.prompt_template.as_deref(),
            apply_retrieval,
            overrides.suggest_followup_questions,
        )?;

        let history = &messages[..messages.len() - 1];
        let new_user_content = user_turn(query, &content);
        let max_tokens = self
            .token_limit
            .saturating_sub(RESPONSE_TOKEN_LIMIT as usize);

        let prompt_messages = build_messages(
            self.token_counter.as_ref(),
            &MessageRequest {
                model: &self.config.chat_model,
                system_prompt: &system_prompt,
                few_shots: self.system_prompt.few_shots(),
                past_messages: history,
                new_user_content: &new_user_content,
                max_tokens,
                allow_fallback: self.config.allow_non_gpt_models,
            },
        )?;

        let mut prompt_step = ThoughtStep::new(
            "Prompt to generate answer",
            serde_json::to_value(&prompt_messages)?,
        )
        .with_prop("model", self.config.chat_model.as_str());
        if let Some(deployment) = &self.config.chat_deployment {
            prompt_step = prompt_step.with_prop("deployment", deployment.as_str());
        }
        let extra_info = extra_info.with_thought(prompt_step);

        let request = CompletionRequest::new(self.config.completion_model(), prompt_messages)
            .with_temperature(overrides.temperature())
            .with_max_tokens(RESPONSE_TOKEN_LIMIT)
            .with_streaming(streaming)
            .with_seed(overrides.seed);

        Ok((
            extra_info,
            DeferredCompletion::new(Arc::clone(&self.completion), request),
        ))
    }
}

/// Text of the last message, which must be a non-empty user message.
pub fn last_user_query(messages: &[ChatMessage]) -> AppResult<&str> {
    let last = messages
        .last()
        .ok_or_else(|| AppError::InvalidInput("At least one message is required".to_string()))?;

    if last.role != ChatRole::User {
        return Err(AppError::InvalidInput(format!(
            "The most recent message must come from the user, not '{}'",
            last.role
        )));
    }

    let text = last.content.as_text().ok_or_else(|| {
        AppError::InvalidInput("The most recent message content must be text".to_string())
    })?;

    if text.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "The most recent message is empty".to_string(),
        ));
    }

    Ok(text)
}
