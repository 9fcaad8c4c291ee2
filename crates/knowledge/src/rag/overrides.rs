//! Per-request retrieval and generation overrides.

use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// `include_category` value that turns retrieval off.
pub const NO_RETRIEVAL_CATEGORY: &str = "__NONE__";

pub const DEFAULT_TOP: usize = 3;
pub const DEFAULT_MINIMUM_SEARCH_SCORE: f64 = 0.2;
pub const DEFAULT_MINIMUM_RERANKER_SCORE: f64 = 0.0;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Which retrieval signals to use. Unset means both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    Text,
    Vectors,
    Hybrid,
}

impl RetrievalMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(Self::Text),
            "vectors" => Some(Self::Vectors),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// Overrides accepted with every chat request.
///
/// Unset fields take the documented defaults through the accessor methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalOverrides {
    pub retrieval_mode: Option<RetrievalMode>,
    pub semantic_ranker: bool,
    pub semantic_captions: bool,
    pub top: Option<usize>,
    pub minimum_search_score: Option<f64>,
    pub minimum_reranker_score: Option<f64>,

    /// Restrict results to a category, or `__NONE__` to skip retrieval
    pub include_category: Option<String>,
    pub exclude_category: Option<String>,

    pub use_oid_security_filter: bool,
    pub use_groups_security_filter: bool,

    pub seed: Option<i64>,
    pub temperature: Option<f32>,

    /// Replaces the system template, or with a `>>>` prefix is appended to it
    pub prompt_template: Option<String>,
    pub suggest_followup_questions: bool,
}

impl RetrievalOverrides {
    /// Check value ranges; fails with `InvalidInput`.
    pub fn validate(&self) -> AppResult<()> {
        if self.top == Some(0) {
            return Err(AppError::InvalidInput("top must be at least 1".to_string()));
        }

        for (name, value) in [
            ("minimum_search_score", self.minimum_search_score),
            ("minimum_reranker_score", self.minimum_reranker_score),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(AppError::InvalidInput(format!(
                        "{} must be a non-negative number, got {}",
                        name, v
                    )));
                }
            }
        }

        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(AppError::InvalidInput(format!(
                    "temperature must be between 0 and 2, got {}",
                    t
                )));
            }
        }

        Ok(())
    }

    pub fn apply_retrieval(&self) -> bool {
        self.include_category.as_deref() != Some(NO_RETRIEVAL_CATEGORY)
    }

    pub fn use_text(&self) -> bool {
        matches!(
            self.retrieval_mode,
            None | Some(RetrievalMode::Text) | Some(RetrievalMode::Hybrid)
        )
    }

    pub fn use_vector(&self) -> bool {
        matches!(
            self.retrieval_mode,
            None | Some(RetrievalMode::Vectors) | Some(RetrievalMode::Hybrid)
        )
    }

    pub fn top(&self) -> usize {
        self.top.unwrap_or(DEFAULT_TOP)
    }

    pub fn minimum_search_score(&self) -> f64 {
        self.minimum_search_score
            .unwrap_or(DEFAULT_MINIMUM_SEARCH_SCORE)
    }

    pub fn minimum_reranker_score(&self) -> f64 {
        self.minimum_reranker_score
            .unwrap_or(DEFAULT_MINIMUM_RERANKER_SCORE)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }
}
