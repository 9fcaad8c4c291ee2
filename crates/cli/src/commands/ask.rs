//! Ask command handler.
//!
//! Answers a question from the corpus, optionally continuing a conversation
//! read from a JSON history file.

use super::setup::{build_orchestrator, OverrideArgs};
use clap::Args;
use futures::StreamExt;
use grounded_core::{config::AppConfig, AppError, AppResult};
use grounded_knowledge::rag::{AnswerEvent, ExtraInfo, ThoughtStep};
use grounded_llm::ChatMessage;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Answer a question from the corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Earlier conversation turns (JSON array of {role, content})
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Wait for the whole answer instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// Output as JSON (one event per line when streaming)
    #[arg(long)]
    pub json: bool,

    /// Print the search results and prompt after the answer
    #[arg(long)]
    pub show_thoughts: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let overrides = self.overrides.overrides()?;
        let claims = self.overrides.claims();

        let mut messages = match &self.history {
            Some(path) => read_history(path)?,
            None => Vec::new(),
        };
        messages.push(ChatMessage::user(self.question.as_str()));

        let orchestrator = build_orchestrator(config).await?;

        if self.no_stream {
            let answer = orchestrator
                .run(&messages, &overrides, &claims, None)
                .await?;

            if self.json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
                return Ok(());
            }

            println!("{}", answer.message.content);
            if let Some(questions) = &answer.context.followup_questions {
                print_followups(questions);
            }
            if self.show_thoughts {
                print_thoughts(&answer.context);
            }
            return Ok(());
        }

        let mut events = orchestrator
            .run_stream(&messages, &overrides, &claims, None)
            .await?;

        let mut context = None;
        let mut stdout = std::io::stdout();

        while let Some(event) = events.next().await {
            let event = event?;

            if self.json {
                println!("{}", serde_json::to_string(&event)?);
                continue;
            }

            match event {
                AnswerEvent::Context { context: info, .. } => context = Some(info),
                AnswerEvent::Delta { content } => {
                    print!("{}", content);
                    stdout.flush().ok();
                }
                AnswerEvent::FollowupQuestions { questions } => {
                    println!();
                    print_followups(&questions);
                }
                AnswerEvent::Done { finish_reason } => {
                    println!();
                    tracing::debug!(
                        "Stream finished: {}",
                        finish_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }

        if self.show_thoughts && !self.json {
            if let Some(info) = context {
                print_thoughts(&info);
            }
        }

        Ok(())
    }
}

/// Read conversation history from a JSON file.
fn read_history(path: &Path) -> AppResult<Vec<ChatMessage>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::InvalidInput(format!("Failed to read history file {:?}: {}", path, e))
    })?;

    serde_json::from_str(&contents).map_err(|e| {
        AppError::InvalidInput(format!("Failed to parse history file {:?}: {}", path, e))
    })
}

fn print_followups(questions: &[String]) {
    if questions.is_empty() {
        return;
    }
    println!("\nFollow-up questions:");
    for question in questions {
        println!("  - {}", question);
    }
}

fn print_thoughts(info: &ExtraInfo) {
    for ThoughtStep {
        title,
        description,
        props,
    } in &info.thoughts
    {
        println!("\n## {}", title);
        if let Some(props) = props {
            for (key, value) in props {
                println!("{}: {}", key, value);
            }
        }
        match serde_json::to_string_pretty(description) {
            Ok(text) => println!("{}", text),
            Err(e) => tracing::warn!("Failed to render thought '{}': {}", title, e),
        }
    }
}
