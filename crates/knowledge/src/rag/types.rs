//! Trace and answer types for the RAG pipeline.

use grounded_llm::ChatRole;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audit record of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtStep {
    pub title: String,

    /// Structured payload of the stage (search results, prompt messages)
    pub description: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub props: Option<BTreeMap<String, String>>,
}

impl ThoughtStep {
    pub fn new(title: impl Into<String>, description: serde_json::Value) -> Self {
        Self {
            title: title.into(),
            description,
            props: None,
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Supporting information returned with an answer.
///
/// Built by value: each stage takes it and hands back an extended copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraInfo {
    /// Source kind ("text") to the formatted sources shown to the model
    #[serde(default)]
    pub data_points: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub thoughts: Vec<ThoughtStep>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followup_questions: Option<Vec<String>>,
}

impl ExtraInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_points(mut self, kind: impl Into<String>, points: Vec<String>) -> Self {
        self.data_points.insert(kind.into(), points);
        self
    }

    pub fn with_thought(mut self, step: ThoughtStep) -> Self {
        self.thoughts.push(step);
        self
    }

    /// Append `other`'s thoughts and data points after this one's.
    pub fn merge(mut self, other: ExtraInfo) -> Self {
        self.data_points.extend(other.data_points);
        self.thoughts.extend(other.thoughts);
        if other.followup_questions.is_some() {
            self.followup_questions = other.followup_questions;
        }
        self
    }

    /// Formatted text sources, if retrieval ran.
    pub fn text_sources(&self) -> &[String] {
        self.data_points
            .get("text")
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Identity of the caller, as established by the authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityClaims {
    /// Object id of the user
    pub oid: Option<String>,

    /// Group ids the user belongs to
    pub groups: Vec<String>,
}

/// Message in an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Buffered answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub message: AnswerMessage,
    pub context: ExtraInfo,

    /// Opaque caller state echoed back unchanged
    #[serde(default)]
    pub session_state: Option<serde_json::Value>,
}

/// One event of a streamed answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerEvent {
    /// First event: the trace gathered before generation
    Context {
        role: ChatRole,
        context: ExtraInfo,
        #[serde(default)]
        session_state: Option<serde_json::Value>,
    },

    /// Incremental answer text
    Delta { content: String },

    /// Suggested follow-up questions split off the answer
    FollowupQuestions { questions: Vec<String> },

    /// Last event of a complete answer
    Done {
        #[serde(default)]
        finish_reason: Option<String>,
    },
}
