//! Configuration management for grounded.
//!
//! Configuration is merged from several sources, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.grounded/config.yaml`, or `GROUNDED_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with most state stored in `.grounded/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Chat providers understood by the completion factory.
pub const KNOWN_CHAT_PROVIDERS: [&str; 3] = ["ollama", "openai", "azure-openai"];

/// Embedding providers understood by the embedding factory.
pub const KNOWN_EMBEDDING_PROVIDERS: [&str; 4] = ["trigram", "ollama", "openai", "azure-openai"];

/// Search backends understood by the search factory.
pub const KNOWN_SEARCH_BACKENDS: [&str; 2] = ["memory", "azure"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .grounded/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Explicit API key, used by any provider that needs one
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log line format ("pretty" or "json")
    pub log_format: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Chat completion settings
    pub chat: ChatSettings,

    /// Query embedding settings
    pub embedding: EmbeddingSettings,

    /// Search index settings
    pub search: SearchSettings,

    /// Prompt id of the system template under `.grounded/prompts/`
    pub prompt: Option<String>,
}

/// Chat completion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSettings {
    /// "ollama", "openai" or "azure-openai"
    pub provider: String,

    /// Model name used for token accounting (e.g. "gpt-4o")
    pub model: String,

    /// Deployment name sent instead of the model when set (Azure OpenAI)
    #[serde(default)]
    pub deployment: Option<String>,

    /// Custom endpoint URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Fall back to the default tokenizer and smallest token limit for
    /// models without a known entry
    #[serde(default = "default_true")]
    pub allow_non_gpt_models: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            deployment: None,
            endpoint: None,
            api_key_env: None,
            allow_non_gpt_models: true,
        }
    }
}

/// Query embedding settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// "trigram", "ollama", "openai" or "azure-openai"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Deployment name (Azure OpenAI)
    #[serde(default)]
    pub deployment: Option<String>,

    /// Custom endpoint URL
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            dimensions: 384,
            deployment: None,
            endpoint: None,
            api_key_env: None,
        }
    }
}

/// Search index settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSettings {
    /// "memory" or "azure"
    pub backend: String,

    /// JSON corpus loaded by the in-memory backend
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,

    /// Search service endpoint (azure)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Index name (azure)
    #[serde(default)]
    pub index: Option<String>,

    /// Environment variable holding the search API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Query language for semantic ranking (e.g. "en-us", "nl-nl")
    #[serde(default = "default_query_language")]
    pub query_language: String,

    /// Query speller ("lexicon" or "none")
    #[serde(default = "default_query_speller")]
    pub query_speller: String,

    /// Semantic configuration name
    #[serde(default = "default_semantic_configuration")]
    pub semantic_configuration: String,

    /// The index carries `oids`/`groups` fields
    #[serde(default)]
    pub use_authentication: bool,

    /// Always apply oid and group filters
    #[serde(default)]
    pub enforce_access_control: bool,
}

fn default_true() -> bool {
    true
}

fn default_query_language() -> String {
    "en-us".to_string()
}

fn default_query_speller() -> String {
    "lexicon".to_string()
}

fn default_semantic_configuration() -> String {
    "default".to_string()
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            corpus_path: None,
            endpoint: None,
            index: None,
            api_key_env: None,
            query_language: default_query_language(),
            query_speller: default_query_speller(),
            semantic_configuration: default_semantic_configuration(),
            use_authentication: false,
            enforce_access_control: false,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    chat: Option<ChatSettings>,
    embedding: Option<EmbeddingSettings>,
    search: Option<SearchSettings>,
    prompt: Option<String>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    format: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            api_key: None,
            log_level: None,
            log_format: None,
            verbose: false,
            no_color: false,
            chat: ChatSettings::default(),
            embedding: EmbeddingSettings::default(),
            search: SearchSettings::default(),
            prompt: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file, environment variables and defaults.
    ///
    /// Environment variables:
    /// - `GROUNDED_WORKSPACE`: Override workspace path
    /// - `GROUNDED_CONFIG`: Path to config file
    /// - `GROUNDED_CHAT_PROVIDER`: Chat provider
    /// - `GROUNDED_CHAT_MODEL`: Chat model
    /// - `GROUNDED_CHAT_DEPLOYMENT`: Chat deployment
    /// - `GROUNDED_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use grounded_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Chat model: {}", config.chat.model);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("GROUNDED_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("GROUNDED_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.grounded_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("GROUNDED_CHAT_PROVIDER") {
            config.chat.provider = provider;
        }

        if let Ok(model) = std::env::var("GROUNDED_CHAT_MODEL") {
            config.chat.model = model;
        }

        if let Ok(deployment) = std::env::var("GROUNDED_CHAT_DEPLOYMENT") {
            config.chat.deployment = Some(deployment);
        }

        config.api_key = std::env::var("GROUNDED_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.merged_with(config_file))
    }

    fn merged_with(&self, file: ConfigFile) -> Self {
        let mut result = self.clone();

        if let Some(path) = file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(format) = logging.format {
                result.log_format = Some(format);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(chat) = file.chat {
            result.chat = chat;
        }

        if let Some(embedding) = file.embedding {
            result.embedding = embedding;
        }

        if let Some(search) = file.search {
            result.search = search;
        }

        if file.prompt.is_some() {
            result.prompt = file.prompt;
        }

        result
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        corpus: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.chat.provider = provider;
        }

        if let Some(model) = model {
            self.chat.model = model;
        }

        if let Some(corpus) = corpus {
            self.search.backend = "memory".to_string();
            self.search.corpus_path = Some(corpus);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .grounded directory.
    pub fn grounded_dir(&self) -> PathBuf {
        self.workspace.join(".grounded")
    }

    /// Resolve an API key: `GROUNDED_API_KEY` first, then the named variable.
    pub fn resolve_api_key(&self, api_key_env: Option<&str>) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        api_key_env.and_then(|var| std::env::var(var).ok())
    }

    /// Validate providers, backends and required secrets.
    pub fn validate(&self) -> AppResult<()> {
        check_known("chat provider", &self.chat.provider, &KNOWN_CHAT_PROVIDERS)?;
        check_known(
            "embedding provider",
            &self.embedding.provider,
            &KNOWN_EMBEDDING_PROVIDERS,
        )?;
        check_known("search backend", &self.search.backend, &KNOWN_SEARCH_BACKENDS)?;

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        for (provider, key_env, endpoint) in [
            (
                self.chat.provider.as_str(),
                self.chat.api_key_env.as_deref(),
                self.chat.endpoint.as_deref(),
            ),
            (
                self.embedding.provider.as_str(),
                self.embedding.api_key_env.as_deref(),
                self.embedding.endpoint.as_deref(),
            ),
        ] {
            if matches!(provider, "openai" | "azure-openai")
                && self.resolve_api_key(key_env).is_none()
            {
                return Err(AppError::Config(format!(
                    "Provider '{}' requires an API key (set GROUNDED_API_KEY or apiKeyEnv)",
                    provider
                )));
            }
            if provider == "azure-openai" && endpoint.is_none() {
                return Err(AppError::Config(
                    "Provider 'azure-openai' requires an endpoint".to_string(),
                ));
            }
        }

        match self.search.backend.as_str() {
            "memory" => {
                if self.search.corpus_path.is_none() {
                    return Err(AppError::Config(
                        "Search backend 'memory' requires corpusPath".to_string(),
                    ));
                }
            }
            "azure" => {
                if self.search.endpoint.is_none() || self.search.index.is_none() {
                    return Err(AppError::Config(
                        "Search backend 'azure' requires endpoint and index".to_string(),
                    ));
                }
            }
            _ => {}
        }

        Ok(())
    }
}

fn check_known(kind: &str, value: &str, known: &[&str]) -> AppResult<()> {
    if known.contains(&value) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Unknown {}: {}. Supported: {}",
            kind,
            value,
            known.join(", ")
        )))
    }
}
