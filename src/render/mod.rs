//! Message rendering
//!
//! [`render_message`] maps one [`ChatMessage`] to a [`Bubble`]: a
//! surface-neutral description of what to show. Bubbles then render to HTML
//! for the page view or to plain text for the terminal.

mod markdown;

use chrono::Local;

pub use markdown::{escape_html, is_safe_link, markdown_to_html};

use crate::chat::{ChatMessage, Role};

/// Label on user bubbles
pub const USER_LABEL: &str = "You";

/// Label on assistant bubbles
pub const ASSISTANT_LABEL: &str = "Tax Assistant";

/// Rendering switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Parse assistant text as markdown
    pub markdown: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { markdown: true }
    }
}

/// Side of the conversation a bubble sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Assistant side
    Start,
    /// User side
    End,
}

/// Bubble contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BubbleBody {
    /// Literal text, whitespace preserved
    Preformatted(String),
    /// Sanitized HTML produced from markdown
    Markup(String),
}

/// Action offered under a bubble
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affordance {
    /// Copy the raw text
    Copy,
    /// Save the raw text to a file
    Export,
    /// Play the reply audio
    Play(String),
}

/// One entry in the references block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceItem {
    /// Source with a safe link target
    Link {
        /// Display title
        title: String,
        /// Link target
        url: String,
    },
    /// Source without a usable link
    Text(String),
}

/// Visual description of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    /// Author
    pub role: Role,
    /// Bubble label
    pub label: &'static str,
    /// Side of the conversation
    pub alignment: Alignment,
    /// Contents
    pub body: BubbleBody,
    /// Actions offered under the bubble
    pub affordances: Vec<Affordance>,
    /// Cited sources; empty hides the block
    pub references: Vec<ReferenceItem>,
    /// Local `HH:MM`
    pub time: String,
}

/// Build the bubble for one message
#[must_use]
pub fn render_message(message: &ChatMessage, options: &RenderOptions) -> Bubble {
    let (label, alignment) = match message.role {
        Role::User => (USER_LABEL, Alignment::End),
        Role::Assistant => (ASSISTANT_LABEL, Alignment::Start),
    };

    let body = if message.role == Role::Assistant && options.markdown {
        BubbleBody::Markup(markdown_to_html(&message.text))
    } else {
        BubbleBody::Preformatted(message.text.clone())
    };

    let mut affordances = Vec::new();
    if message.role == Role::Assistant {
        affordances.push(Affordance::Copy);
        affordances.push(Affordance::Export);
        if let Some(url) = &message.speech_url {
            affordances.push(Affordance::Play(url.clone()));
        }
    }

    let references = message
        .references()
        .iter()
        .map(|r| match &r.url {
            Some(url) if is_safe_link(url) => ReferenceItem::Link {
                title: r.title.clone(),
                url: url.clone(),
            },
            _ => ReferenceItem::Text(r.title.clone()),
        })
        .collect();

    Bubble {
        role: message.role,
        label,
        alignment,
        body,
        affordances,
        references,
        time: message.timestamp.with_timezone(&Local).format("%H:%M").to_string(),
    }
}

impl Bubble {
    /// Whether a playback action is offered
    #[must_use]
    pub fn speech_url(&self) -> Option<&str> {
        self.affordances.iter().find_map(|a| match a {
            Affordance::Play(url) => Some(url.as_str()),
            _ => None,
        })
    }

    /// HTML fragment for the page view
    #[must_use]
    pub fn to_html(&self) -> String {
        self.to_html_with_copy_label("Copy")
    }

    /// HTML fragment with a custom copy button label ("Copied" after a copy)
    #[must_use]
    pub fn to_html_with_copy_label(&self, copy_label: &str) -> String {
        let side = match self.alignment {
            Alignment::Start => "start",
            Alignment::End => "end",
        };
        let role = match self.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };

        let mut html = format!("<div class=\"message {role} align-{side}\">\n");
        html.push_str(&format!("<span class=\"label\">{}</span>\n", self.label));

        match &self.body {
            BubbleBody::Preformatted(text) => html.push_str(&format!(
                "<div class=\"bubble\"><p class=\"pre\">{}</p></div>\n",
                escape_html(text)
            )),
            BubbleBody::Markup(markup) => html.push_str(&format!(
                "<div class=\"bubble prose\">{markup}</div>\n"
            )),
        }

        if !self.affordances.is_empty() {
            html.push_str("<div class=\"actions\">");
            for affordance in &self.affordances {
                match affordance {
                    Affordance::Copy => html.push_str(&format!(
                        "<button data-action=\"copy\">{copy_label}</button>"
                    )),
                    Affordance::Export => html.push_str("<button data-action=\"save\">Save</button>"),
                    Affordance::Play(url) => html.push_str(&format!(
                        "<button data-action=\"play\" data-src=\"{}\">Play</button>",
                        escape_html(url)
                    )),
                }
            }
            html.push_str("</div>\n");
        }

        if !self.references.is_empty() {
            html.push_str("<div class=\"references\">\n<p class=\"heading\">Sources</p>\n");
            for item in &self.references {
                match item {
                    ReferenceItem::Link { title, url } => html.push_str(&format!(
                        "<div><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a></div>\n",
                        escape_html(url),
                        escape_html(title)
                    )),
                    ReferenceItem::Text(title) => {
                        html.push_str(&format!("<div><span>{}</span></div>\n", escape_html(title)));
                    }
                }
            }
            html.push_str("</div>\n");
        }

        html.push_str(&format!("<span class=\"time\">{}</span>\n</div>", self.time));
        html
    }

    /// Plain-text block for the terminal
    ///
    /// `index` is the number shown for affordance commands.
    #[must_use]
    pub fn to_terminal(&self, index: usize, raw_text: &str) -> String {
        let indent = match self.alignment {
            Alignment::Start => "",
            Alignment::End => "    ",
        };

        let mut out = format!("{indent}[{index}] {} · {}\n", self.label, self.time);
        for line in raw_text.lines() {
            out.push_str(indent);
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }

        if !self.references.is_empty() {
            out.push_str(&format!("{indent}  Sources:\n"));
            for item in &self.references {
                match item {
                    ReferenceItem::Link { title, url } => {
                        out.push_str(&format!("{indent}    - {title} <{url}>\n"));
                    }
                    ReferenceItem::Text(title) => out.push_str(&format!("{indent}    - {title}\n")),
                }
            }
        }

        if !self.affordances.is_empty() {
            let hints: Vec<String> = self
                .affordances
                .iter()
                .map(|a| match a {
                    Affordance::Copy => format!("/copy {index}"),
                    Affordance::Export => format!("/save {index}"),
                    Affordance::Play(_) => format!("/play {index}"),
                })
                .collect();
            out.push_str(&format!("{indent}  ({})\n", hints.join("  ")));
        }

        out
    }
}

/// Text of the typing indicator
pub const TYPING_TEXT: &str = "Tax Assistant is researching your question…";

/// HTML for the typing indicator
#[must_use]
pub fn typing_indicator_html() -> String {
    format!(
        "<div class=\"message assistant align-start typing\" aria-live=\"polite\">\n<span class=\"label\">{ASSISTANT_LABEL}</span>\n<div class=\"bubble\"><span class=\"dot\"></span><span class=\"dot\"></span><span class=\"dot\"></span></div>\n</div>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Reference;

    fn assistant(text: &str) -> ChatMessage {
        ChatMessage::assistant(text)
    }

    #[test]
    fn user_bubble_is_literal_and_bare() {
        let bubble = render_message(&ChatMessage::user("**not bold**"), &RenderOptions::default());
        assert_eq!(bubble.label, USER_LABEL);
        assert_eq!(bubble.alignment, Alignment::End);
        assert_eq!(bubble.body, BubbleBody::Preformatted("**not bold**".into()));
        assert!(bubble.affordances.is_empty());
    }

    #[test]
    fn assistant_markdown_toggle() {
        let msg = assistant("**Yes**");
        let on = render_message(&msg, &RenderOptions { markdown: true });
        assert_eq!(on.body, BubbleBody::Markup("<p><strong>Yes</strong></p>".into()));

        let off = render_message(&msg, &RenderOptions { markdown: false });
        assert_eq!(off.body, BubbleBody::Preformatted("**Yes**".into()));
    }

    #[test]
    fn play_only_with_speech_url() {
        let plain = render_message(&assistant("a"), &RenderOptions::default());
        assert_eq!(plain.affordances, vec![Affordance::Copy, Affordance::Export]);
        assert_eq!(plain.speech_url(), None);

        let spoken = render_message(
            &assistant("a").with_speech_url(Some("https://cdn/a.mp3".into())),
            &RenderOptions::default(),
        );
        assert_eq!(spoken.speech_url(), Some("https://cdn/a.mp3"));
    }

    #[test]
    fn references_link_only_with_url() {
        let msg = assistant("a").with_references(Some(vec![
            Reference {
                title: "Section 12".into(),
                url: None,
            },
            Reference {
                title: "Section 12".into(),
                url: Some("https://x".into()),
            },
        ]));
        let bubble = render_message(&msg, &RenderOptions::default());
        assert_eq!(
            bubble.references,
            vec![
                ReferenceItem::Text("Section 12".into()),
                ReferenceItem::Link {
                    title: "Section 12".into(),
                    url: "https://x".into()
                },
            ]
        );

        let html = bubble.to_html();
        assert_eq!(html.matches("<a href=").count(), 1);
        assert!(html.contains("<span>Section 12</span>"));
    }

    #[test]
    fn unsafe_reference_url_is_text() {
        let msg = assistant("a").with_references(Some(vec![Reference {
            title: "bad".into(),
            url: Some("javascript:alert(1)".into()),
        }]));
        let bubble = render_message(&msg, &RenderOptions::default());
        assert_eq!(bubble.references, vec![ReferenceItem::Text("bad".into())]);
    }

    #[test]
    fn empty_references_hide_block() {
        let msg = assistant("a").with_references(Some(vec![]));
        let html = render_message(&msg, &RenderOptions::default()).to_html();
        assert!(!html.contains("Sources"));
    }

    #[test]
    fn user_html_is_escaped() {
        let html = render_message(&ChatMessage::user("<b>hi</b>"), &RenderOptions::default()).to_html();
        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
    }

    #[test]
    fn terminal_block_lists_commands() {
        let msg = assistant("line one\nline two").with_speech_url(Some("https://a".into()));
        let bubble = render_message(&msg, &RenderOptions::default());
        let text = bubble.to_terminal(3, &msg.text);
        assert!(text.starts_with("[3] Tax Assistant"));
        assert!(text.contains("  line two\n"));
        assert!(text.contains("/copy 3  /save 3  /play 3"));
    }
}
