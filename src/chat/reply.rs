//! Webhook reply interpretation
//!
//! The webhook answers with an arbitrary JSON object. Fields are picked by a
//! fixed precedence:
//!
//! - text: `text`, `message`, `response`
//! - audio: `speech`, `audio`
//! - references: `references`, `sources`
//!
//! A string field counts only when non-empty. A reference field counts as
//! soon as it holds an array, even an empty one.

use serde_json::Value;

use super::message::Reference;
use crate::{Error, Result};

/// Text used when the reply carries no recognized text field
pub const NO_ANSWER_TEXT: &str = "I apologize, but I was unable to retrieve an answer for your query at this time. Please try rephrasing your question or contact a tax professional for assistance.";

const TEXT_FIELDS: [&str; 3] = ["text", "message", "response"];
const SPEECH_FIELDS: [&str; 2] = ["speech", "audio"];
const REFERENCE_FIELDS: [&str; 2] = ["references", "sources"];

/// Assistant reply extracted from a webhook response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Answer text
    pub text: String,
    /// Audio rendition of the answer
    pub speech_url: Option<String>,
    /// Cited sources
    pub references: Option<Vec<Reference>>,
}

impl Reply {
    /// Interpret a decoded response body
    ///
    /// # Errors
    ///
    /// Returns error if the body is JSON `null`
    pub fn from_value(body: &Value) -> Result<Self> {
        if body.is_null() {
            return Err(Error::Reply("response body is null".to_string()));
        }

        let text = first_string(body, &TEXT_FIELDS).unwrap_or_else(|| NO_ANSWER_TEXT.to_string());
        let speech_url = first_string(body, &SPEECH_FIELDS);
        let references = REFERENCE_FIELDS
            .iter()
            .find_map(|field| body.get(field).and_then(Value::as_array))
            .map(|entries| entries.iter().filter_map(parse_reference).collect());

        Ok(Self {
            text,
            speech_url,
            references,
        })
    }

    /// Decode and interpret a raw response body
    ///
    /// # Errors
    ///
    /// Returns error if the body is not valid JSON or is `null`
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_value(&value)
    }
}

fn first_string(body: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| body.get(field).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn parse_reference(entry: &Value) -> Option<Reference> {
    let title = entry.get("title").and_then(Value::as_str)?;
    let url = entry
        .get("url")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(ToString::to_string);

    Some(Reference {
        title: title.to_string(),
        url,
    })
}
