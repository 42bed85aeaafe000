//! Interactive terminal front end
//!
//! Lines typed on stdin feed the [`PageShell`] input. A line ending in `\`
//! continues onto the next line; a line starting with `/` is a command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{Key, PageShell, PromptSet, render_page};
use crate::actions::{Clipboard, SystemClipboard, TerminalClipboard, copy_with_fallback, export_text};
use crate::chat::{ChatMessage, ChatSession, Role, SubmitOutcome};
use crate::render::{RenderOptions, TYPING_TEXT, render_message};
use crate::speech::{SpeechInput, SpeechUpdate};
use crate::config::UiOptions;
use crate::voice::AudioPlayer;
use crate::{Error, Result};

const HELP: &str = "\
Type a question and press Enter to send it. End a line with \\ to continue on the next line.

Commands:
  /prompts          list suggested questions
  /prompt N         ask suggested question N
  /copy [N]         copy reply N (default: latest) to the clipboard
  /save [N]         save reply N as a text file
  /play [N]         play the audio of reply N
  /listen           dictate a question
  /stop             stop listening
  /cancel           stop waiting for the current answer
  /webhook [URL]    show or change the webhook URL (/webhook clear to reset)
  /html [PATH]      write the conversation as an HTML page
  /help             show this help
  /quit             leave";

/// File name of the HTML snapshot when `/html` gets no path
const PAGE_FILE_NAME: &str = "tax-assistant-chat.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Line-oriented chat loop over stdin and stdout
pub struct Terminal {
    session: Arc<ChatSession>,
    shell: PageShell,
    speech: SpeechInput,
    player: Arc<dyn AudioPlayer>,
    render: RenderOptions,
    download_dir: PathBuf,
    clipboard: Option<SystemClipboard>,
    printed: usize,
    typing_shown: bool,
    speech_open: bool,
}

impl Terminal {
    /// Assemble the front end
    #[must_use]
    pub fn new(
        session: Arc<ChatSession>,
        shell: PageShell,
        speech: SpeechInput,
        player: Arc<dyn AudioPlayer>,
        download_dir: PathBuf,
    ) -> Self {
        let render = RenderOptions {
            markdown: shell.options().markdown,
        };
        Self {
            session,
            shell,
            speech,
            player,
            render,
            download_dir,
            clipboard: None,
            printed: 0,
            typing_shown: false,
            speech_open: true,
        }
    }

    /// Run until `/quit` or end of input
    ///
    /// # Errors
    ///
    /// Returns error if stdin cannot be read
    pub async fn run(mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut revisions = self.session.subscribe();

        println!("Tax Assistant. Type /help for commands.");
        let revision = *revisions.borrow_and_update();
        self.refresh(revision);
        if PageShell::show_welcome(self.session.len()) {
            self.print_prompts();
        }
        if self.shell.webhook_url().is_none() {
            println!("\n{}", missing_webhook_hint(self.shell.options()));
        }

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if self.handle_line(&line) == Flow::Quit {
                        break;
                    }
                }
                changed = revisions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let revision = *revisions.borrow_and_update();
                    self.refresh(revision);
                }
                update = self.speech.next_update(), if self.speech_open => self.on_speech(update),
            }
        }

        self.speech.stop_listening();
        self.session.cancel();
        Ok(())
    }

    /// Print messages added since the last refresh and the typing indicator
    fn refresh(&mut self, revision: u64) {
        if !self.shell.observe_revision(revision) {
            return;
        }

        let messages = self.session.messages();
        for (index, message) in messages.iter().enumerate().skip(self.printed) {
            let bubble = render_message(message, &self.render);
            print!("\n{}", bubble.to_terminal(index, &message.text));
        }
        self.printed = messages.len();

        let loading = self.session.is_loading();
        if loading && !self.typing_shown {
            println!("\n  {TYPING_TEXT}");
        }
        self.typing_shown = loading;
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        let loading = self.session.is_loading();

        if let Some(continued) = line.strip_suffix('\\') {
            self.shell.type_text(continued);
            self.shell.handle_key(Key::Enter { shift: true }, loading);
            return Flow::Continue;
        }

        if self.shell.input().is_empty() && line.trim_start().starts_with('/') {
            return self.command(line.trim());
        }

        self.shell.type_text(line);
        match self.shell.handle_key(Key::Enter { shift: false }, loading) {
            Some(text) => self.submit(text),
            None if loading && !self.shell.input().trim().is_empty() => {
                println!("Still researching the previous question. Press Enter to send once it is answered, or /cancel.");
            }
            None => {}
        }
        Flow::Continue
    }

    fn submit(&mut self, text: String) {
        let endpoint = self.shell.webhook_url().map(str::to_string);
        match self.session.spawn_submit(&text, endpoint) {
            Ok(_) => {
                if self.speech.is_listening() {
                    self.speech.stop_listening();
                }
                self.speech.clear_transcript();
            }
            Err(SubmitOutcome::Busy) => {
                self.shell.set_input(text);
                println!("Still researching the previous question. Press Enter to send once it is answered, or /cancel.");
            }
            Err(outcome) => tracing::trace!(?outcome, "nothing submitted"),
        }
    }

    fn command(&mut self, line: &str) -> Flow {
        let (name, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(name, arg)| (name, arg.trim()));

        match name {
            "/help" => println!("{HELP}"),
            "/prompts" => self.print_prompts(),
            "/prompt" => self.ask_prompt(arg),
            "/copy" => {
                if let Some(message) = self.target(arg) {
                    self.copy(&message);
                }
            }
            "/save" => {
                if let Some(message) = self.target(arg) {
                    self.save(&message);
                }
            }
            "/play" => {
                if let Some(message) = self.target(arg) {
                    self.play(&message);
                }
            }
            "/listen" => self.listen(),
            "/stop" => {
                self.speech.stop_listening();
                println!("Stopped listening.");
            }
            "/cancel" => {
                if self.session.cancel() {
                    println!("Cancelled.");
                } else {
                    println!("Nothing to cancel.");
                }
            }
            "/webhook" => self.webhook(arg),
            "/html" => self.write_page(arg),
            "/quit" | "/exit" => return Flow::Quit,
            other => println!("Unknown command {other}. Type /help for the list."),
        }
        Flow::Continue
    }

    fn print_prompts(&self) {
        println!("\nTry asking:");
        match self.shell.prompts() {
            PromptSet::Flat(prompts) => {
                for (i, prompt) in prompts.iter().enumerate() {
                    println!("  {}. {prompt}", i + 1);
                }
            }
            PromptSet::Categorized(categories) => {
                let mut number = 1;
                for category in categories {
                    println!("  {}", category.title);
                    for prompt in category.prompts {
                        println!("    {number}. {prompt}");
                        number += 1;
                    }
                }
            }
        }
        println!("Use /prompt N to ask one.");
    }

    fn ask_prompt(&mut self, arg: &str) {
        let Ok(number) = arg.parse::<usize>() else {
            println!("Usage: /prompt N");
            return;
        };
        let loading = self.session.is_loading();
        match self.shell.choose_prompt(number, loading) {
            Some(prompt) => {
                println!("> {prompt}");
                self.submit(prompt.to_string());
            }
            None if loading => println!("Still researching the previous question."),
            None => println!("There is no suggested question {number}."),
        }
    }

    /// Assistant message addressed by `arg`, or the latest one
    fn target(&self, arg: &str) -> Option<ChatMessage> {
        if arg.is_empty() {
            let message = self.session.last_assistant();
            if message.is_none() {
                println!("There is no reply yet.");
            }
            return message;
        }

        let Ok(index) = arg.parse::<usize>() else {
            println!("Expected a message number, got {arg:?}.");
            return None;
        };
        match self.session.message(index) {
            Some(message) if message.role == Role::Assistant => Some(message),
            Some(_) => {
                println!("Message {index} is your own question.");
                None
            }
            None => {
                println!("There is no message {index}.");
                None
            }
        }
    }

    fn copy(&mut self, message: &ChatMessage) {
        if self.clipboard.is_none() {
            self.clipboard = SystemClipboard::new()
                .map_err(|e| tracing::debug!(error = %e, "system clipboard unavailable"))
                .ok();
        }

        let mut fallback = TerminalClipboard::new(std::io::stdout());
        let primary = self.clipboard.as_mut().map(|c| c as &mut dyn Clipboard);
        match copy_with_fallback(primary, &mut fallback, &message.text) {
            Ok(method) => {
                tracing::debug!(?method, id = %message.id, "copied reply");
                self.shell.mark_copied(message.id, Instant::now());
                println!("{}", self.shell.copy_label(message.id, Instant::now()));
            }
            Err(e) => println!("Copy failed: {e}"),
        }
    }

    fn save(&self, message: &ChatMessage) {
        match export_text(&self.download_dir, &message.text, Utc::now().date_naive()) {
            Ok(path) => println!("Saved to {}", path.display()),
            Err(e) => println!("Save failed: {e}"),
        }
    }

    fn play(&self, message: &ChatMessage) {
        let Some(url) = message.speech_url.clone() else {
            println!("That reply has no audio.");
            return;
        };

        let player = Arc::clone(&self.player);
        tokio::spawn(async move {
            if let Err(e) = player.play(&url).await {
                tracing::warn!(error = %e, url, "playback failed");
                println!("Playback failed: {e}");
            }
        });
    }

    fn listen(&mut self) {
        match self.speech.start_listening() {
            Ok(()) => println!("Listening... speak now (/stop to finish)."),
            Err(Error::SpeechUnavailable(notice)) => println!("{notice}"),
            Err(e) => println!("Could not start listening: {e}"),
        }
    }

    fn on_speech(&mut self, update: Option<SpeechUpdate>) {
        match update {
            None => self.speech_open = false,
            Some(SpeechUpdate::Transcript(text)) => {
                self.shell.mirror_transcript(&text);
                println!("  (heard) {text}");
            }
            Some(SpeechUpdate::Stopped { error: Some(error) }) => {
                println!("Voice input stopped: {error}");
            }
            Some(SpeechUpdate::Stopped { error: None }) => {
                if self.shell.input().trim().is_empty() {
                    println!("Didn't catch that.");
                } else {
                    println!(
                        "Press Enter to send \"{}\", or type to add to it.",
                        self.shell.input()
                    );
                }
            }
        }
    }

    fn webhook(&mut self, arg: &str) {
        if arg.is_empty() {
            match self.shell.webhook_url() {
                Some(url) => println!("Webhook URL: {url}"),
                None => println!("No webhook URL is set."),
            }
            return;
        }

        let value = if arg == "clear" { "" } else { arg };
        match self.shell.save_webhook_url(value) {
            Ok(Some(url)) => println!("Webhook URL saved: {url}"),
            Ok(None) => println!("Saved webhook URL cleared."),
            Err(e) => println!("{e}"),
        }
    }

    fn write_page(&self, arg: &str) {
        let path = if arg.is_empty() {
            self.download_dir.join(PAGE_FILE_NAME)
        } else {
            PathBuf::from(arg)
        };

        let html = render_page(
            &self.shell,
            &self.session.messages(),
            self.session.is_loading(),
            Instant::now(),
        );
        match write_file(&path, &html) {
            Ok(()) => println!("Wrote {}", path.display()),
            Err(e) => println!("Could not write page: {e}"),
        }
    }
}

/// What to tell the user when no webhook URL is configured
fn missing_webhook_hint(options: &UiOptions) -> &'static str {
    if options.webhook_configurable {
        "No webhook URL is set. Use /webhook URL before asking."
    } else {
        "No webhook URL is set. Add one to config.toml or pass --webhook-url."
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
