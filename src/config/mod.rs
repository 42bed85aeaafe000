//! Configuration management for the tax assistant
//!
//! Values are layered env > TOML file > defaults. The webhook URL
//! additionally honors the persisted chat setting: command line or env first,
//! then the saved setting, then the file.

pub mod file;
pub mod store;

use std::path::PathBuf;

pub use store::{FileStore, MemoryStore, SettingsStore, WEBHOOK_URL_KEY};

use crate::{Error, Result};

use self::file::ConfigFile;

/// Display and feature options shared by the shell and renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiOptions {
    /// Render assistant replies as markdown
    pub markdown: bool,
    /// Group suggested prompts by topic
    pub categorized_prompts: bool,
    /// Allow changing the webhook URL from the chat
    pub webhook_configurable: bool,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            markdown: true,
            categorized_prompts: false,
            webhook_configurable: true,
        }
    }
}

/// Voice configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Voice input and reply playback enabled
    pub enabled: bool,
    /// STT model
    pub stt_model: String,
    /// Recognition language
    pub language: String,
}

/// API keys
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` key for Whisper
    pub openai: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("openai", &self.openai.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Options decided on the command line
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Webhook URL from `--webhook-url` or `TAX_ASSISTANT_WEBHOOK_URL`
    pub webhook_url: Option<String>,
    /// `--no-voice`
    pub disable_voice: bool,
    /// `--plain`: render replies as literal text
    pub plain: bool,
}

/// Tax assistant configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Resolved webhook URL
    pub webhook_url: Option<String>,

    /// Display options
    pub ui: UiOptions,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Data directory (persisted settings)
    pub data_dir: PathBuf,

    /// Where exported replies are written
    pub download_dir: PathBuf,
}

impl Config {
    /// Load configuration with default options
    #[must_use]
    pub fn load() -> Self {
        Self::load_with_options(&LoadOptions::default())
    }

    /// Load configuration from env, the config file and persisted settings
    ///
    /// Unreadable persisted settings are logged and skipped.
    #[must_use]
    pub fn load_with_options(options: &LoadOptions) -> Self {
        let fc = file::load_config_file();
        let data_dir = default_data_dir();
        let stored = stored_webhook_url(&FileStore::in_dir(&data_dir));

        let mut config = Self::from_parts(fc, stored, options);
        config.data_dir = data_dir;

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.api_keys.openai = Some(key);
        }
        if let Ok(model) = std::env::var("TAX_ASSISTANT_STT_MODEL") {
            config.voice.stt_model = model;
        }
        if let Ok(language) = std::env::var("TAX_ASSISTANT_LANGUAGE") {
            config.voice.language = language;
        }

        config
    }

    /// Assemble configuration from already-loaded sources
    #[must_use]
    pub fn from_parts(fc: ConfigFile, stored_webhook: Option<String>, options: &LoadOptions) -> Self {
        let webhook_url = resolve_webhook_url(&[
            options.webhook_url.as_deref(),
            stored_webhook.as_deref(),
            fc.webhook.url.as_deref(),
        ]);

        let defaults = UiOptions::default();
        let ui = UiOptions {
            markdown: !options.plain && fc.ui.markdown.unwrap_or(defaults.markdown),
            categorized_prompts: fc
                .ui
                .categorized_prompts
                .unwrap_or(defaults.categorized_prompts),
            webhook_configurable: fc
                .ui
                .webhook_configurable
                .unwrap_or(defaults.webhook_configurable),
        };

        if options.disable_voice {
            tracing::info!("voice explicitly disabled via --no-voice");
        }

        let voice = VoiceConfig {
            enabled: !options.disable_voice && fc.voice.enabled.unwrap_or(true),
            stt_model: fc.voice.stt_model.unwrap_or_else(|| "whisper-1".to_string()),
            language: fc.voice.language.unwrap_or_else(|| "en-US".to_string()),
        };

        Self {
            webhook_url,
            ui,
            voice,
            api_keys: ApiKeys {
                openai: fc.api_keys.openai,
            },
            data_dir: PathBuf::from("."),
            download_dir: default_download_dir(),
        }
    }

    /// Store for settings changed from the chat
    #[must_use]
    pub fn settings_store(&self) -> FileStore {
        FileStore::in_dir(&self.data_dir)
    }
}

/// Saved webhook URL, or `None` when the store cannot be read
fn stored_webhook_url(store: &dyn SettingsStore) -> Option<String> {
    store.get(WEBHOOK_URL_KEY).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable settings");
        None
    })
}

/// First non-blank candidate, trimmed
fn resolve_webhook_url(candidates: &[Option<&str>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Check that `raw` is an absolute `http` or `https` URL
///
/// # Errors
///
/// Returns error if the URL does not parse or uses another scheme
pub fn validate_webhook_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let url = url::Url::parse(trimmed)
        .map_err(|e| Error::Config(format!("invalid webhook URL {trimmed:?}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(Error::Config(format!(
            "webhook URL must use http or https, not {other}"
        ))),
    }
}

/// Data directory: `~/.local/share/tax-assistant` on Linux
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".tax-assistant"),
        |d| d.data_dir().join("tax-assistant"),
    )
}

/// User download directory, falling back to the working directory
#[must_use]
pub fn default_download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|d| d.download_dir().map(std::path::Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}
