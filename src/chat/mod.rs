//! Chat session: message records, webhook transport and the session store

mod message;
mod reply;
mod session;
mod webhook;

pub use message::{ChatMessage, Reference, Role, WELCOME_TEXT};
pub use reply::{NO_ANSWER_TEXT, Reply};
pub use session::{ChatSession, FAILURE_TEXT, SessionConfig, SubmitOutcome};
pub use webhook::{HttpWebhook, Webhook};
