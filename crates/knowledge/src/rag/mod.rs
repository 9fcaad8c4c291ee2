//! Retrieval-augmented answering.
//!
//! The orchestrator retrieves sources through the hybrid search client,
//! grounds the prompt in them and defers the completion call to the caller.

pub mod access;
pub mod context;
pub mod deferred;
pub mod orchestrator;
pub mod overrides;
pub mod retrieval;
pub mod runner;
pub mod types;

pub use access::{AccessFilterBuilder, SecurityFilterBuilder};
pub use context::{user_turn, AssembledContext, SOURCES_MARKER};
pub use deferred::{Completion, DeferredCompletion};
pub use orchestrator::{last_user_query, OrchestratorConfig, RagOrchestrator, RESPONSE_TOKEN_LIMIT};
pub use overrides::{RetrievalMode, RetrievalOverrides, NO_RETRIEVAL_CATEGORY};
pub use retrieval::Retriever;
pub use runner::{extract_followup_questions, AnswerStream};
pub use types::{
    AnswerEvent, AnswerMessage, ChatAnswer, ExtraInfo, IdentityClaims, ThoughtStep,
};
