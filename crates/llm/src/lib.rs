//! LLM integration crate for grounded.
//!
//! This crate provides a provider-agnostic abstraction for chat completion:
//! the conversation message model, the `CompletionClient` trait with
//! buffered and streaming modes, token accounting for prompt budgets, and
//! concrete providers.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI / Azure OpenAI**: `chat/completions` API
//!
//! # Example
//! ```no_run
//! use grounded_llm::{ChatMessage, CompletionClient, CompletionRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = CompletionRequest::new("llama3.2", vec![ChatMessage::user("Hello, world!")]);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod lines;
pub mod providers;
pub mod tokens;
pub mod types;

// Re-export main types
pub use client::{
    ChatChunk, ChatCompletion, ChatMessage, ChatRole, ChatStream, CompletionClient,
    CompletionRequest, ContentPart, ImageUrl, LlmUsage, MessageContent,
};
pub use factory::create_client;
pub use providers::{OllamaClient, OpenAiClient};
pub use tokens::{TiktokenCounter, TokenCounter};
pub use types::ProviderType;
