//! Prompts command handler.

use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_prompt::{list_prompts, load_prompt};

/// List prompt definitions under `.grounded/prompts/`
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Print the template of this prompt
    #[arg(long)]
    pub show: Option<String>,
}

impl PromptsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        if let Some(id) = &self.show {
            let definition = load_prompt(&config.workspace, id)?;
            println!("# {} ({})", definition.title, definition.api_version);
            println!("{}", definition.template);
            return Ok(());
        }

        let ids = list_prompts(&config.workspace)?;
        if ids.is_empty() {
            println!("No prompts found in .grounded/prompts/");
        }
        for id in ids {
            let marker = if config.prompt.as_deref() == Some(id.as_str()) {
                " (active)"
            } else {
                ""
            };
            println!("{}{}", id, marker);
        }

        Ok(())
    }
}
