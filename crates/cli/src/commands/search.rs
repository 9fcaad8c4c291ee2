//! Search command handler.

use super::setup::{build_orchestrator, OverrideArgs};
use clap::Args;
use grounded_core::{config::AppConfig, AppResult};

/// Retrieve sources without generating an answer
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Search query
    pub query: String,

    /// Output the search trace as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub overrides: OverrideArgs,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let overrides = self.overrides.overrides()?;
        let orchestrator = build_orchestrator(config).await?;

        let (_, info) = orchestrator
            .retrieve(&self.query, &overrides, &self.overrides.claims())
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
            return Ok(());
        }

        let sources = info.text_sources();
        if sources.is_empty() {
            println!("No sources matched.");
        }
        for (i, source) in sources.iter().enumerate() {
            println!("[{}] {}", i + 1, source);
        }

        Ok(())
    }
}
