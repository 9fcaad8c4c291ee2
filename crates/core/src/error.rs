//! Error types for the grounded workspace.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! caller input, model support, retrieval, completion and prompt errors.

use thiserror::Error;

/// Unified error type for the grounded workspace.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed caller input (e.g. the last message is not plain user text).
    /// Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No token limit or tokenizer is known for the configured model and
    /// fallback to the default scheme is disabled.
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// Embedding or search service failures
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Chat completion failures, including streams interrupted mid-way
    #[error("Completion error: {0}")]
    Completion(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
