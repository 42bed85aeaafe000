//! Page shell
//!
//! Owns the input field, suggested prompts, scroll tracking and the webhook
//! setting. It never talks to the network itself: submissions come back to
//! the caller as text to hand to the session.

mod page;
mod prompts;
mod terminal;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

pub use page::render_page;
pub use prompts::{PROMPT_CATEGORIES, PromptCategory, PromptSet, QUICK_PROMPTS};
pub use terminal::Terminal;

use crate::actions::CopyFeedback;
use crate::config::{SettingsStore, UiOptions, WEBHOOK_URL_KEY, validate_webhook_url};
use crate::{Error, Result};

/// Key presses the input field reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable character
    Char(char),
    /// Delete the last character
    Backspace,
    /// Confirm; with `shift` a newline is inserted instead
    Enter {
        /// Shift held
        shift: bool,
    },
}

/// Input and settings state around a chat session
pub struct PageShell {
    options: UiOptions,
    input: String,
    webhook_url: Option<String>,
    store: Arc<dyn SettingsStore>,
    seen_revision: Option<u64>,
    copy_feedback: HashMap<Uuid, CopyFeedback>,
}

impl PageShell {
    /// Create a shell
    ///
    /// `webhook_url` is the user's saved override, if any.
    #[must_use]
    pub fn new(options: UiOptions, store: Arc<dyn SettingsStore>, webhook_url: Option<String>) -> Self {
        Self {
            options,
            input: String::new(),
            webhook_url,
            store,
            seen_revision: None,
            copy_feedback: HashMap::new(),
        }
    }

    /// Display options
    #[must_use]
    pub const fn options(&self) -> &UiOptions {
        &self.options
    }

    /// Current input text
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the input text
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Append typed text
    pub fn type_text(&mut self, text: &str) {
        self.input.push_str(text);
    }

    /// React to a key press
    ///
    /// Returns the text to submit when the key confirms a non-blank input
    /// while no request is in flight. The input is cleared on submission.
    pub fn handle_key(&mut self, key: Key, is_loading: bool) -> Option<String> {
        match key {
            Key::Char(c) => {
                self.input.push(c);
                None
            }
            Key::Backspace => {
                self.input.pop();
                None
            }
            Key::Enter { shift: true } => {
                self.input.push('\n');
                None
            }
            Key::Enter { shift: false } => self.take_submission(is_loading),
        }
    }

    /// Take the input for submission, if it may be sent now
    pub fn take_submission(&mut self, is_loading: bool) -> Option<String> {
        if is_loading || self.input.trim().is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.input))
    }

    /// Mirror a speech transcript into the input field
    pub fn mirror_transcript(&mut self, transcript: &str) {
        self.input = transcript.to_string();
    }

    /// Suggested prompts for the configured layout
    #[must_use]
    pub fn prompts(&self) -> PromptSet {
        PromptSet::new(self.options.categorized_prompts)
    }

    /// Pick a suggested prompt by 1-based number; ignored while loading
    #[must_use]
    pub fn choose_prompt(&self, number: usize, is_loading: bool) -> Option<&'static str> {
        if is_loading {
            return None;
        }
        self.prompts().get(number)
    }

    /// Whether the welcome area with prompts is shown
    #[must_use]
    pub const fn show_welcome(message_count: usize) -> bool {
        message_count <= 1
    }

    /// Record a session revision; returns `true` when the view should
    /// scroll to the newest entry
    pub fn observe_revision(&mut self, revision: u64) -> bool {
        if self.seen_revision == Some(revision) {
            return false;
        }
        self.seen_revision = Some(revision);
        true
    }

    /// Webhook override saved by the user
    #[must_use]
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    /// Save or clear the webhook override
    ///
    /// A blank value clears the saved setting.
    ///
    /// # Errors
    ///
    /// Returns error if the webhook is not configurable, the URL is invalid
    /// or the setting cannot be stored
    pub fn save_webhook_url(&mut self, raw: &str) -> Result<Option<&str>> {
        if !self.options.webhook_configurable {
            return Err(Error::Config(
                "the webhook URL is fixed by configuration".to_string(),
            ));
        }

        if raw.trim().is_empty() {
            self.store.remove(WEBHOOK_URL_KEY)?;
            self.webhook_url = None;
            tracing::info!("cleared webhook URL");
            return Ok(None);
        }

        let url = validate_webhook_url(raw)?;
        self.store.set(WEBHOOK_URL_KEY, &url)?;
        tracing::info!(url = %url, "saved webhook URL");
        self.webhook_url = Some(url);
        Ok(self.webhook_url.as_deref())
    }

    /// Record a copy of message `id` at `now`
    pub fn mark_copied(&mut self, id: Uuid, now: Instant) {
        self.copy_feedback.entry(id).or_default().mark(now);
    }

    /// Copy button label for message `id` at `now`
    #[must_use]
    pub fn copy_label(&self, id: Uuid, now: Instant) -> &'static str {
        self.copy_feedback
            .get(&id)
            .copied()
            .unwrap_or_default()
            .label(now)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::MemoryStore;

    fn shell(options: UiOptions) -> (PageShell, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (PageShell::new(options, store.clone(), None), store)
    }

    #[test]
    fn enter_submits_and_clears() {
        let (mut shell, _) = shell(UiOptions::default());
        for c in "hi".chars() {
            shell.handle_key(Key::Char(c), false);
        }
        assert_eq!(shell.handle_key(Key::Enter { shift: false }, false), Some("hi".into()));
        assert_eq!(shell.input(), "");
    }

    #[test]
    fn shift_enter_inserts_newline() {
        let (mut shell, _) = shell(UiOptions::default());
        shell.type_text("a");
        assert_eq!(shell.handle_key(Key::Enter { shift: true }, false), None);
        shell.type_text("b");
        assert_eq!(shell.input(), "a\nb");
    }

    #[test]
    fn blank_or_loading_does_not_submit() {
        let (mut shell, _) = shell(UiOptions::default());
        shell.type_text("   ");
        assert_eq!(shell.handle_key(Key::Enter { shift: false }, false), None);

        shell.set_input("question");
        assert_eq!(shell.handle_key(Key::Enter { shift: false }, true), None);
        assert_eq!(shell.input(), "question");
    }

    #[test]
    fn backspace() {
        let (mut shell, _) = shell(UiOptions::default());
        shell.type_text("ab");
        shell.handle_key(Key::Backspace, false);
        assert_eq!(shell.input(), "a");
    }

    #[test]
    fn transcript_replaces_input() {
        let (mut shell, _) = shell(UiOptions::default());
        shell.type_text("old");
        shell.mirror_transcript("what is zakat");
        assert_eq!(shell.input(), "what is zakat");
    }

    #[test]
    fn prompts_ignored_while_loading() {
        let (shell, _) = shell(UiOptions::default());
        assert_eq!(shell.choose_prompt(1, false), Some(QUICK_PROMPTS[0]));
        assert_eq!(shell.choose_prompt(1, true), None);
    }

    #[test]
    fn welcome_only_before_first_question() {
        assert!(PageShell::show_welcome(1));
        assert!(!PageShell::show_welcome(2));
    }

    #[test]
    fn scroll_on_each_new_revision() {
        let (mut shell, _) = shell(UiOptions::default());
        assert!(shell.observe_revision(0));
        assert!(!shell.observe_revision(0));
        assert!(shell.observe_revision(1));
    }

    #[test]
    fn saves_and_clears_webhook() {
        let (mut shell, store) = shell(UiOptions::default());
        shell.save_webhook_url("https://hooks.example.com/tax").unwrap();
        assert_eq!(shell.webhook_url(), Some("https://hooks.example.com/tax"));
        assert_eq!(
            store.get(WEBHOOK_URL_KEY).unwrap().as_deref(),
            Some("https://hooks.example.com/tax")
        );

        shell.save_webhook_url("").unwrap();
        assert_eq!(shell.webhook_url(), None);
        assert_eq!(store.get(WEBHOOK_URL_KEY).unwrap(), None);
    }

    #[test]
    fn invalid_webhook_rejected() {
        let (mut shell, store) = shell(UiOptions::default());
        assert!(shell.save_webhook_url("nope").is_err());
        assert_eq!(store.get(WEBHOOK_URL_KEY).unwrap(), None);
    }

    #[test]
    fn fixed_webhook_cannot_change() {
        let options = UiOptions {
            webhook_configurable: false,
            ..UiOptions::default()
        };
        let (mut shell, _) = shell(options);
        assert!(shell.save_webhook_url("https://hooks.example.com").is_err());
    }

    #[test]
    fn copy_label_reverts() {
        let (mut shell, _) = shell(UiOptions::default());
        let id = Uuid::new_v4();
        let now = Instant::now();
        shell.mark_copied(id, now);
        assert_eq!(shell.copy_label(id, now), "Copied");
        assert_eq!(shell.copy_label(id, now + Duration::from_secs(2)), "Copy");
        assert_eq!(shell.copy_label(Uuid::new_v4(), now), "Copy");
    }
}
