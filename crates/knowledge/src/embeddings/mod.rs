//! Query embedding.
//!
//! Provides the `EmbeddingClient` trait, an offline trigram provider and
//! HTTP providers for Ollama and OpenAI-compatible services.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingClient};
pub use providers::{OllamaProvider, OpenAiProvider, TrigramProvider};
