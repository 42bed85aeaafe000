//! TOML configuration file loading
//!
//! Supports `~/.config/tax-assistant/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Webhook endpoint
    #[serde(default)]
    pub webhook: WebhookFileConfig,

    /// Display options
    #[serde(default)]
    pub ui: UiFileConfig,

    /// Voice input/output
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Webhook configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct WebhookFileConfig {
    /// URL questions are posted to
    pub url: Option<String>,
}

/// Display configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UiFileConfig {
    /// Render assistant replies as markdown
    pub markdown: Option<bool>,

    /// Group suggested prompts by topic
    pub categorized_prompts: Option<bool>,

    /// Allow changing the webhook URL from the chat
    pub webhook_configurable: Option<bool>,
}

/// Voice configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Recognition language (e.g. "en-US")
    pub language: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ApiKeysFileConfig {
    /// `OpenAI` key used for Whisper transcription
    pub openai: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Write the config file to the standard path, creating parent directories
///
/// # Errors
///
/// Returns error if the file cannot be encoded or written
pub fn save_config_file(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_file_path()
        .unwrap_or_else(|| PathBuf::from(".config/tax-assistant/config.toml"));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, toml::to_string_pretty(config)?)?;

    tracing::info!(path = %path.display(), "wrote config file");
    Ok(path)
}

/// Return the config file path: `~/.config/tax-assistant/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("tax-assistant").join("config.toml"))
}
