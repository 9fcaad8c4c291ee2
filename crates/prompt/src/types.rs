//! Prompt types for grounded.

use grounded_llm::ChatMessage;
use serde::{Deserialize, Serialize};

/// A system prompt definition loaded from YAML.
///
/// The template is rendered with Handlebars and may reference
/// `{{sources_reference_content}}`, `{{follow_up_questions_prompt}}` and
/// `{{injected_prompt}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// System template with Handlebars syntax
    pub template: String,

    /// Replacement for the built-in grounding instructions
    #[serde(rename = "sourcesReference", default, skip_serializing_if = "Option::is_none")]
    pub sources_reference: Option<String>,

    /// Replacement for the built-in follow-up question instructions
    #[serde(rename = "followUpQuestions", default, skip_serializing_if = "Option::is_none")]
    pub follow_up_questions: Option<String>,

    /// Example exchanges sent between the system prompt and the history
    #[serde(rename = "fewShots", default, skip_serializing_if = "Vec::is_empty")]
    pub few_shots: Vec<ChatMessage>,
}

/// Values interpolated into a system template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemPromptParts {
    /// Grounding instructions; empty when retrieval did not run
    pub sources_reference_content: String,

    /// Follow-up question instructions; empty unless requested
    pub follow_up_questions_prompt: String,

    /// Caller-injected text from a `>>>` prompt override
    pub injected_prompt: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: support.system
title: Support Assistant
apiVersion: "1.0"
createdBy: test
template: |
  You help employees.
  {{sources_reference_content}}
followUpQuestions: "Suggest two <<questions>>."
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "support.system");
        assert!(def.template.contains("{{sources_reference_content}}"));
        assert!(def.sources_reference.is_none());
        assert_eq!(
            def.follow_up_questions.as_deref(),
            Some("Suggest two <<questions>>.")
        );
        assert!(def.few_shots.is_empty());
    }

    #[test]
    fn test_prompt_definition_few_shots() {
        let yaml = r#"
id: support.system
title: Support Assistant
apiVersion: "1.0"
template: "You help employees."
fewShots:
  - role: user
    content: How do I request leave?
  - role: assistant
    content: Ask your manager [leave.md].
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.few_shots.len(), 2);
        assert_eq!(def.few_shots[0], ChatMessage::user("How do I request leave?"));
        assert_eq!(
            def.few_shots[1],
            ChatMessage::assistant("Ask your manager [leave.md].")
        );
    }

    #[test]
    fn test_parts_serialize_with_template_names() {
        let parts = SystemPromptParts {
            injected_prompt: "Answer in Dutch.".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&parts).unwrap();
        assert_eq!(value["injected_prompt"], "Answer in Dutch.");
        assert_eq!(value["sources_reference_content"], "");
    }
}
