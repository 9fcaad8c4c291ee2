//! Prompt assembly for grounded.
//!
//! This crate provides:
//! - YAML-based system prompt definitions
//! - Handlebars rendering of the system template and its fragments
//! - Token-budgeted assembly of the chat message sequence

pub mod builder;
pub mod loader;
pub mod messages;
pub mod types;

// Re-export main types
pub use builder::{
    render_template, SystemPromptBuilder, DEFAULT_FOLLOW_UP_QUESTIONS, DEFAULT_SOURCES_REFERENCE,
    DEFAULT_SYSTEM_TEMPLATE, INJECT_PREFIX,
};
pub use loader::{list_prompts, load_prompt, PROMPTS_DIR};
pub use messages::{build_messages, MessageRequest};
pub use types::{PromptDefinition, SystemPromptParts};
