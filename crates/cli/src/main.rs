//! Grounded CLI
//!
//! Main entry point for the grounded command-line tool.
//! Answers questions from a document corpus with cited sources.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, PromptsCommand, SearchCommand};
use grounded_core::logging::{self, LogFormat};
use grounded_core::{config::AppConfig, AppResult};
use std::path::PathBuf;

/// Grounded - answers from your documents, with citations
#[derive(Parser, Debug)]
#[command(name = "grounded")]
#[command(about = "Retrieval-augmented answers over a document corpus", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "GROUNDED_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "GROUNDED_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Log line format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Chat provider (ollama, openai, azure-openai)
    #[arg(short, long, global = true, env = "GROUNDED_CHAT_PROVIDER")]
    provider: Option<String>,

    /// Chat model
    #[arg(short, long, global = true, env = "GROUNDED_CHAT_MODEL")]
    model: Option<String>,

    /// Corpus file or directory for the in-memory search backend
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question from the corpus
    Ask(AskCommand),

    /// Retrieve sources without generating an answer
    Search(SearchCommand),

    /// List prompt definitions in the workspace
    Prompts(PromptsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;

    let mut config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.corpus,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    if cli.log_format.is_some() {
        config.log_format = cli.log_format;
    }

    let log_format = match config.log_format.as_deref() {
        Some(name) => LogFormat::parse(name).ok_or_else(|| {
            grounded_core::AppError::Config(format!("Unknown log format: {}", name))
        })?,
        None => LogFormat::default(),
    };
    logging::init_logging(config.log_level.as_deref(), config.no_color, log_format)?;

    tracing::info!("Grounded CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Chat: {} / {}", config.chat.provider, config.chat.model);
    tracing::debug!("Search backend: {}", config.search.backend);

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Search(_) => "search",
        Commands::Prompts(_) => "prompts",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
