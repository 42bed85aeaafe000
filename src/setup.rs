//! Interactive first-run setup wizard (`tax-assistant setup`)

use dialoguer::{Confirm, Input};

use crate::config::file::{
    ApiKeysFileConfig, ConfigFile, UiFileConfig, VoiceFileConfig, WebhookFileConfig,
    config_file_path, load_config_file, save_config_file,
};
use crate::config::validate_webhook_url;

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("Tax Assistant Setup\n");

    let existing = load_config_file();
    if let Some(path) = config_file_path().filter(|p| p.exists()) {
        println!("Existing config found at {}\n", path.display());
    }

    // 1. Webhook
    let mut url_prompt = Input::<String>::new()
        .with_prompt("Webhook URL (leave blank to set it later)")
        .allow_empty(true)
        .validate_with(|input: &String| -> Result<(), String> {
            if input.trim().is_empty() {
                return Ok(());
            }
            validate_webhook_url(input).map(|_| ()).map_err(|e| e.to_string())
        });
    if let Some(url) = existing.webhook.url.clone() {
        url_prompt = url_prompt.default(url);
    }
    let url_input = url_prompt.interact_text()?;
    let webhook_url = Some(url_input.trim().to_string()).filter(|u| !u.is_empty());

    // 2. Display
    let markdown = Confirm::new()
        .with_prompt("Format replies as markdown?")
        .default(existing.ui.markdown.unwrap_or(true))
        .interact()?;

    let categorized_prompts = Confirm::new()
        .with_prompt("Group suggested questions by topic?")
        .default(existing.ui.categorized_prompts.unwrap_or(false))
        .interact()?;

    let webhook_configurable = Confirm::new()
        .with_prompt("Allow changing the webhook URL from the chat?")
        .default(existing.ui.webhook_configurable.unwrap_or(true))
        .interact()?;

    // 3. Voice (optional)
    let enable_voice = Confirm::new()
        .with_prompt("Enable voice input and spoken replies?")
        .default(existing.voice.enabled.unwrap_or(true))
        .interact()?;

    let mut api_keys = existing.api_keys.clone();
    let voice = if enable_voice {
        api_keys = prompt_openai_key(&existing.api_keys)?;

        let language: String = Input::new()
            .with_prompt("Recognition language")
            .default(
                existing
                    .voice
                    .language
                    .clone()
                    .unwrap_or_else(|| "en-US".to_string()),
            )
            .interact_text()?;

        VoiceFileConfig {
            enabled: Some(true),
            stt_model: Some(
                existing
                    .voice
                    .stt_model
                    .clone()
                    .unwrap_or_else(|| "whisper-1".to_string()),
            ),
            language: Some(language),
        }
    } else {
        VoiceFileConfig {
            enabled: Some(false),
            ..existing.voice.clone()
        }
    };

    // 4. Write config
    let config_file = ConfigFile {
        webhook: WebhookFileConfig { url: webhook_url },
        ui: UiFileConfig {
            markdown: Some(markdown),
            categorized_prompts: Some(categorized_prompts),
            webhook_configurable: Some(webhook_configurable),
        },
        voice,
        api_keys,
    };

    let path = save_config_file(&config_file)?;
    println!("\nConfig written to {}", path.display());
    println!("\nSetup complete! Run `tax-assistant` to start chatting.");

    Ok(())
}

/// Ask for the `OpenAI` key used for transcription, keeping the current one
/// on blank input
fn prompt_openai_key(existing: &ApiKeysFileConfig) -> anyhow::Result<ApiKeysFileConfig> {
    let current = existing.openai.as_deref();
    let prompt = current.map_or_else(
        || "OpenAI API key for voice transcription (OPENAI_API_KEY)".to_string(),
        |key| format!("OpenAI API key (current: {}, leave blank to keep)", mask_key(key)),
    );

    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    let openai = if input.trim().is_empty() {
        current.map(str::to_string)
    } else {
        Some(input.trim().to_string())
    };

    Ok(ApiKeysFileConfig { openai })
}

/// Show only the ends of a secret
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
