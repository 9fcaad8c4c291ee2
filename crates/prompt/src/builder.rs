//! System prompt rendering.
//!
//! The system prompt is a Handlebars template with three interpolation
//! points: `sources_reference_content` (grounding instructions, only when
//! retrieval ran), `follow_up_questions_prompt` and `injected_prompt`.

use crate::types::{PromptDefinition, SystemPromptParts};
use grounded_core::{AppError, AppResult};
use grounded_llm::ChatMessage;
use handlebars::Handlebars;

/// Prefix marking a prompt override that is appended to the template
/// rather than replacing it.
pub const INJECT_PREFIX: &str = ">>>";

/// Built-in system template.
pub const DEFAULT_SYSTEM_TEMPLATE: &str = "\
You are an assistant that helps staff with questions about the documents in the connected knowledge base.
Be brief in your answers. Answer in the language of the question unless the user asks otherwise.
Stay neutral and avoid political or ideological statements.
Warn the user when they share sensitive personal data.
When tabular information helps, return it as an HTML table. Do not return markdown tables.
{{sources_reference_content}}
{{follow_up_questions_prompt}}
{{injected_prompt}}";

/// Grounding instructions spliced in when retrieval ran.
pub const DEFAULT_SOURCES_REFERENCE: &str = "\
Answer ONLY with facts from the sources retrieved from the selected knowledge base.
Each source has a name followed by a colon and the actual information. Always include the source name for each fact you use in the response.
Use square brackets to reference the source, for example [info1.txt]. Don't combine sources, list each source separately, for example [info1.txt][info2.pdf].
If the information needed is not in the sources, say that you cannot answer based on the available sources.";

/// Instructions asking the model for follow-up question suggestions.
pub const DEFAULT_FOLLOW_UP_QUESTIONS: &str = "\
Generate 3 very brief follow-up questions that the user would likely ask next.
Enclose the follow-up questions in double angle brackets. Example:
<<Are there exclusions for prescriptions?>>
<<Which pharmacies can be ordered from?>>
<<What is the limit for over-the-counter medication?>>
Do not repeat questions that have already been asked.
Make sure the last question ends with \">>\".";

/// Renders system prompts from a template and its fragments.
#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    template: String,
    sources_reference: String,
    follow_up_questions: String,
    few_shots: Vec<ChatMessage>,
}

impl Default for SystemPromptBuilder {
    fn default() -> Self {
        Self {
            template: DEFAULT_SYSTEM_TEMPLATE.to_string(),
            sources_reference: DEFAULT_SOURCES_REFERENCE.to_string(),
            follow_up_questions: DEFAULT_FOLLOW_UP_QUESTIONS.to_string(),
            few_shots: Vec::new(),
        }
    }
}

impl SystemPromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder using a loaded prompt definition; fragments it leaves out
    /// keep their built-in text.
    pub fn from_definition(definition: &PromptDefinition) -> Self {
        let defaults = Self::default();
        Self {
            template: definition.template.clone(),
            sources_reference: definition
                .sources_reference
                .clone()
                .unwrap_or(defaults.sources_reference),
            follow_up_questions: definition
                .follow_up_questions
                .clone()
                .unwrap_or(defaults.follow_up_questions),
            few_shots: definition.few_shots.clone(),
        }
    }

    /// Replace the example exchanges.
    pub fn with_few_shots(mut self, few_shots: Vec<ChatMessage>) -> Self {
        self.few_shots = few_shots;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Example exchanges placed after the system prompt.
    pub fn few_shots(&self) -> &[ChatMessage] {
        &self.few_shots
    }

    /// Render the system prompt for one request.
    ///
    /// `prompt_override` replaces the template, or when it starts with
    /// `>>>` its remainder is injected at `{{injected_prompt}}`.
    pub fn render(
        &self,
        prompt_override: Option<&str>,
        apply_retrieval: bool,
        suggest_followups: bool,
    ) -> AppResult<String> {
        let mut parts = SystemPromptParts {
            sources_reference_content: if apply_retrieval {
                self.sources_reference.clone()
            } else {
                String::new()
            },
            follow_up_questions_prompt: if suggest_followups {
                self.follow_up_questions.clone()
            } else {
                String::new()
            },
            injected_prompt: String::new(),
        };

        let template = match prompt_override {
            None => self.template.as_str(),
            Some(text) => match text.strip_prefix(INJECT_PREFIX) {
                Some(injected) => {
                    parts.injected_prompt = format!("{}\n", injected);
                    self.template.as_str()
                }
                None => {
                    tracing::debug!("System template replaced by request override");
                    text
                }
            },
        };

        render_template(template, &parts)
    }
}

/// Render a Handlebars template without HTML escaping.
pub fn render_template<T: serde::Serialize>(template: &str, data: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("system", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("system", data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
