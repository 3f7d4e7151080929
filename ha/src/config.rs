//! Hiring assistant configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Text completion service
    pub llm: LlmConfig,

    /// Where the procedure database lives
    pub storage: StorageConfig,

    /// Chat and response behaviour
    pub assistant: AssistantConfig,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.hireassist.yml`, then
    /// `~/.config/hireassist/hireassist.yml`, then built-in defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".hireassist.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("hireassist").join("hireassist.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (only "openai"-compatible endpoints are supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL, including the version prefix
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Sampling temperature
    pub temperature: f32,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    ///
    /// Returns None when the variable is unset or empty.
    pub fn get_api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|key| !key.trim().is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "llama-33-70b".to_string(),
            api_key_env: "HIREASSIST_API_KEY".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 1024,
            timeout_ms: 60_000,
            temperature: 0.1,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(rename = "db-path")]
    pub db_path: String,
}

impl StorageConfig {
    /// Database path with a leading `~/` resolved
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        // XDG data directory (~/.local/share/hireassist on Linux)
        let db_path = dirs::data_dir()
            .map(|d| d.join("hireassist").join("hireassist.db"))
            .unwrap_or_else(|| PathBuf::from("hireassist.db"))
            .to_string_lossy()
            .into_owned();

        Self { db_path }
    }
}

/// Assistant behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Chat messages replayed when a session starts
    #[serde(rename = "history-limit")]
    pub history_limit: usize,

    /// Upcoming steps shown after the current one in checklists
    #[serde(rename = "preview-steps")]
    pub preview_steps: usize,

    /// Directory with prompt templates overriding the built-in ones
    #[serde(rename = "prompts-dir")]
    pub prompts_dir: Option<String>,
}

impl AssistantConfig {
    pub fn expanded_prompts_dir(&self) -> Option<PathBuf> {
        self.prompts_dir.as_deref().map(expand_home)
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            history_limit: procstore::DEFAULT_HISTORY_LIMIT,
            preview_steps: 2,
            prompts_dir: None,
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
