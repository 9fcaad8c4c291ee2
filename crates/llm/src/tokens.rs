//! Token accounting for chat models.
//!
//! Token limits come from a fixed table of known chat models. Message costs
//! follow the chat format accounting: every message carries a fixed overhead
//! on top of the encoded role and content, and a `name` costs one extra
//! token. Unknown models may fall back to the smallest known limit and the
//! cl100k encoding when the caller allows it.

use crate::client::{ChatMessage, ContentPart, MessageContent};
use grounded_core::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tiktoken_rs::CoreBPE;

/// Tokens added for every message (`<|start|>{role}\n{content}<|end|>\n`).
pub const TOKENS_PER_MESSAGE: usize = 3;

/// Tokens added when a message carries a `name`.
pub const TOKENS_PER_NAME: usize = 1;

/// Flat cost charged for an image part (low-detail image).
pub const TOKENS_PER_IMAGE: usize = 85;

/// Context window sizes of known chat models.
const MODEL_TOKEN_LIMITS: [(&str, usize); 9] = [
    ("gpt-35-turbo", 4000),
    ("gpt-3.5-turbo", 4000),
    ("gpt-35-turbo-16k", 16000),
    ("gpt-3.5-turbo-16k", 16000),
    ("gpt-4", 8100),
    ("gpt-4-32k", 32000),
    ("gpt-4v", 128000),
    ("gpt-4o", 128000),
    ("gpt-4o-mini", 128000),
];

/// BPE vocabularies used by the supported models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Cl100kBase,
    O200kBase,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cl100kBase => "cl100k_base",
            Self::O200kBase => "o200k_base",
        }
    }
}

/// Context window of a known model, if any.
pub fn known_token_limit(model: &str) -> Option<usize> {
    let model = model.to_lowercase();
    MODEL_TOKEN_LIMITS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, limit)| *limit)
}

/// Smallest known context window, used for unrecognized models.
pub fn minimum_token_limit() -> usize {
    MODEL_TOKEN_LIMITS
        .iter()
        .map(|(_, limit)| *limit)
        .min()
        .unwrap_or(4000)
}

/// Encoding of a known model, if any.
pub fn encoding_for_model(model: &str) -> Option<Encoding> {
    let model = model.to_lowercase();
    if model.starts_with("gpt-4o") {
        Some(Encoding::O200kBase)
    } else if model.starts_with("gpt-4") || model.starts_with("gpt-35") || model.starts_with("gpt-3.5") {
        Some(Encoding::Cl100kBase)
    } else {
        None
    }
}

/// Token accounting for a target model.
pub trait TokenCounter: Send + Sync {
    /// Context window of `model`; unknown models get the smallest known
    /// window when `allow_fallback`, else `UnsupportedModel`.
    fn token_limit(&self, model: &str, allow_fallback: bool) -> AppResult<usize>;

    /// Cost of one message, overhead included.
    fn count_message_tokens(
        &self,
        model: &str,
        message: &ChatMessage,
        allow_fallback: bool,
    ) -> AppResult<usize>;

    /// Cost of a message sequence.
    fn count_messages(
        &self,
        model: &str,
        messages: &[ChatMessage],
        allow_fallback: bool,
    ) -> AppResult<usize> {
        messages.iter().try_fold(0, |total, message| {
            Ok(total + self.count_message_tokens(model, message, allow_fallback)?)
        })
    }
}

/// Token counter backed by the tiktoken BPE vocabularies.
///
/// Vocabularies are loaded lazily and cached per encoding.
#[derive(Default)]
pub struct TiktokenCounter {
    encoders: RwLock<HashMap<Encoding, Arc<CoreBPE>>>,
}

impl TiktokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_encoding(&self, model: &str, allow_fallback: bool) -> AppResult<Encoding> {
        match encoding_for_model(model) {
            Some(encoding) => Ok(encoding),
            None if allow_fallback => {
                tracing::debug!(
                    "No tokenizer known for model '{}', using {}",
                    model,
                    Encoding::Cl100kBase.as_str()
                );
                Ok(Encoding::Cl100kBase)
            }
            None => Err(AppError::UnsupportedModel(format!(
                "No tokenizer known for model '{}'",
                model
            ))),
        }
    }

    fn encoder(&self, encoding: Encoding) -> AppResult<Arc<CoreBPE>> {
        {
            let encoders = self
                .encoders
                .read()
                .map_err(|_| AppError::Other("Tokenizer cache lock poisoned".to_string()))?;
            if let Some(bpe) = encoders.get(&encoding) {
                return Ok(Arc::clone(bpe));
            }
        }

        let bpe = match encoding {
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
        }
        .map_err(|e| {
            AppError::UnsupportedModel(format!("Failed to load {}: {}", encoding.as_str(), e))
        })?;
        let bpe = Arc::new(bpe);

        let mut encoders = self
            .encoders
            .write()
            .map_err(|_| AppError::Other("Tokenizer cache lock poisoned".to_string()))?;
        encoders.insert(encoding, Arc::clone(&bpe));

        Ok(bpe)
    }
}

impl TokenCounter for TiktokenCounter {
    fn token_limit(&self, model: &str, allow_fallback: bool) -> AppResult<usize> {
        match known_token_limit(model) {
            Some(limit) => Ok(limit),
            None if allow_fallback => {
                let limit = minimum_token_limit();
                tracing::warn!(
                    "Model '{}' not recognized, defaulting to a token limit of {}",
                    model,
                    limit
                );
                Ok(limit)
            }
            None => Err(AppError::UnsupportedModel(format!(
                "Expected a known chat model (gpt-35-turbo and above), received '{}'",
                model
            ))),
        }
    }

    fn count_message_tokens(
        &self,
        model: &str,
        message: &ChatMessage,
        allow_fallback: bool,
    ) -> AppResult<usize> {
        let encoding = self.resolve_encoding(model, allow_fallback)?;
        let bpe = self.encoder(encoding)?;
        let encode = |text: &str| bpe.encode_with_special_tokens(text).len();

        let mut tokens = TOKENS_PER_MESSAGE + encode(message.role.as_str());

        tokens += match &message.content {
            MessageContent::Text(text) => encode(text),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => encode(text),
                    ContentPart::ImageUrl { .. } => TOKENS_PER_IMAGE,
                })
                .sum(),
        };

        if let Some(name) = &message.name {
            tokens += encode(name) + TOKENS_PER_NAME;
        }

        Ok(tokens)
    }
}
