//! Tax Assistant - terminal chat client for a tax-research webhook
//!
//! This library provides the pieces of the client:
//! - Chat session store and webhook transport
//! - Message rendering (markdown to sanitized HTML, terminal blocks)
//! - Copy and export affordances
//! - Voice input (microphone + Whisper) and reply audio playback
//! - Page shell with suggested prompts and webhook settings
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Shell                            │
//! │   Terminal REPL  │  HTML page  │  Prompts  │ Settings│
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Chat Session                         │
//! │   Messages  │  In-flight flag  │  Speech  │  Render  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Webhook                             │
//! │   POST {"query"}  →  text / speech / references     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod actions;
pub mod chat;
pub mod config;
pub mod error;
pub mod render;
pub mod setup;
pub mod shell;
pub mod speech;
pub mod voice;

pub use chat::{ChatMessage, ChatSession, HttpWebhook, Reply, SessionConfig, SubmitOutcome, Webhook};
pub use config::Config;
pub use error::{Error, Result};
pub use render::{Bubble, RenderOptions, render_message};
pub use shell::{PageShell, Terminal};
pub use speech::{MicrophoneRecognizer, SpeechInput, SpeechRecognizer, UnavailableRecognizer};
pub use voice::{AudioPlayer, SilentPlayer, SpeakerPlayer};
