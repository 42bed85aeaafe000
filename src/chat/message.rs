//! Chat message records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text of the assistant message every session starts with
pub const WELCOME_TEXT: &str = "Hello! I'm your AI Tax Assistant. Ask me any tax-related question — I'll research it for you through our knowledge base. How can I help you today?";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking questions
    User,
    /// The webhook-backed assistant
    Assistant,
}

/// A source the assistant cited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    /// Display title (e.g. "Section 12")
    pub title: String,

    /// Link target, when the source is addressable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One entry in the conversation
///
/// Messages are immutable once created; the session only ever appends them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier
    pub id: Uuid,

    /// Author of the message
    pub role: Role,

    /// Raw message text (markdown for assistant replies)
    pub text: String,

    /// Spoken version of the reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_url: Option<String>,

    /// Cited sources; `None` when the reply carried no reference field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<Reference>>,

    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a user message stamped with the current time
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            text: text.into(),
            speech_url: None,
            references: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a plain assistant message stamped with the current time
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            text: text.into(),
            speech_url: None,
            references: None,
            timestamp: Utc::now(),
        }
    }

    /// The greeting that seeds every session
    #[must_use]
    pub fn welcome() -> Self {
        Self::assistant(WELCOME_TEXT)
    }

    /// Attach an audio URL
    #[must_use]
    pub fn with_speech_url(mut self, url: Option<String>) -> Self {
        self.speech_url = url;
        self
    }

    /// Attach cited sources
    #[must_use]
    pub fn with_references(mut self, references: Option<Vec<Reference>>) -> Self {
        self.references = references;
        self
    }

    /// Whether this message was authored by the user
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Cited sources, empty when none were returned
    #[must_use]
    pub fn references(&self) -> &[Reference] {
        self.references.as_deref().unwrap_or_default()
    }
}
