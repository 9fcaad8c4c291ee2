//! Shared wiring: retrieval flags and orchestrator construction.

use clap::Args;
use grounded_core::{config::AppConfig, AppError, AppResult};
use grounded_knowledge::rag::{
    IdentityClaims, OrchestratorConfig, RagOrchestrator, RetrievalMode, RetrievalOverrides,
    SecurityFilterBuilder,
};
use grounded_knowledge::{create_provider, create_search_client, EmbeddingClient};
use grounded_llm::{create_client, TiktokenCounter};
use grounded_prompt::{load_prompt, SystemPromptBuilder};
use std::sync::Arc;

/// Per-request retrieval and generation flags.
#[derive(Args, Debug, Default)]
pub struct OverrideArgs {
    /// Retrieval mode (text, vectors, hybrid)
    #[arg(long)]
    pub retrieval_mode: Option<String>,

    /// Re-rank results with the semantic ranker
    #[arg(long)]
    pub semantic_ranker: bool,

    /// Cite semantic captions instead of full content
    #[arg(long)]
    pub semantic_captions: bool,

    /// Number of sources to retrieve
    #[arg(long)]
    pub top: Option<usize>,

    /// Drop results scoring below this
    #[arg(long)]
    pub minimum_search_score: Option<f64>,

    /// Drop results re-ranked below this (0-4)
    #[arg(long)]
    pub minimum_reranker_score: Option<f64>,

    /// Only search this category ("__NONE__" disables retrieval)
    #[arg(long)]
    pub include_category: Option<String>,

    /// Skip this category
    #[arg(long)]
    pub exclude_category: Option<String>,

    /// Restrict results to documents shared with --oid
    #[arg(long)]
    pub use_oid_security_filter: bool,

    /// Restrict results to documents shared with --group
    #[arg(long)]
    pub use_groups_security_filter: bool,

    /// Object id of the caller
    #[arg(long)]
    pub oid: Option<String>,

    /// Group id of the caller (repeatable)
    #[arg(long = "group")]
    pub groups: Vec<String>,

    /// Sampling seed
    #[arg(long)]
    pub seed: Option<i64>,

    /// Sampling temperature (0.0-2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Replace the system prompt, or append to it when prefixed with ">>>"
    #[arg(long)]
    pub prompt_template: Option<String>,

    /// Ask the model for follow-up questions
    #[arg(long)]
    pub suggest_followup_questions: bool,
}

impl OverrideArgs {
    pub fn overrides(&self) -> AppResult<RetrievalOverrides> {
        let retrieval_mode = self
            .retrieval_mode
            .as_deref()
            .map(|mode| {
                RetrievalMode::parse(mode).ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "Unknown retrieval mode '{}'. Expected text, vectors or hybrid",
                        mode
                    ))
                })
            })
            .transpose()?;

        let overrides = RetrievalOverrides {
            retrieval_mode,
            semantic_ranker: self.semantic_ranker,
            semantic_captions: self.semantic_captions,
            top: self.top,
            minimum_search_score: self.minimum_search_score,
            minimum_reranker_score: self.minimum_reranker_score,
            include_category: self.include_category.clone(),
            exclude_category: self.exclude_category.clone(),
            use_oid_security_filter: self.use_oid_security_filter,
            use_groups_security_filter: self.use_groups_security_filter,
            seed: self.seed,
            temperature: self.temperature,
            prompt_template: self.prompt_template.clone(),
            suggest_followup_questions: self.suggest_followup_questions,
        };
        overrides.validate()?;
        Ok(overrides)
    }

    pub fn claims(&self) -> IdentityClaims {
        IdentityClaims {
            oid: self.oid.clone(),
            groups: self.groups.clone(),
        }
    }
}

/// Build the orchestrator from configuration.
pub async fn build_orchestrator(config: &AppConfig) -> AppResult<RagOrchestrator> {
    let embedding_key = config.resolve_api_key(config.embedding.api_key_env.as_deref());
    let embedder = create_provider(&config.embedding, embedding_key.as_deref())?;
    tracing::debug!(
        "Embedding with {} ({}, {} dims)",
        embedder.provider_name(),
        embedder.model_name(),
        embedder.dimensions()
    );

    let search_key = config.resolve_api_key(config.search.api_key_env.as_deref());
    let search = create_search_client(
        &config.search,
        &config.workspace,
        embedder.as_ref(),
        search_key.as_deref(),
    )
    .await?;

    let chat_key = config.resolve_api_key(config.chat.api_key_env.as_deref());
    let completion = create_client(&config.chat, chat_key.as_deref())?;

    let orchestrator_config = OrchestratorConfig {
        chat_model: config.chat.model.clone(),
        chat_deployment: config.chat.deployment.clone(),
        allow_non_gpt_models: config.chat.allow_non_gpt_models,
    };

    let mut orchestrator = RagOrchestrator::new(
        orchestrator_config,
        embedder,
        search,
        Arc::new(SecurityFilterBuilder::from_settings(&config.search)),
        completion,
        Arc::new(TiktokenCounter::new()),
    )?;

    if let Some(prompt_id) = &config.prompt {
        let definition = load_prompt(&config.workspace, prompt_id)?;
        tracing::debug!("Using system prompt '{}'", definition.id);
        orchestrator = orchestrator.with_system_prompt(SystemPromptBuilder::from_definition(
            &definition,
        ));
    }

    Ok(orchestrator)
}
