//! Standalone HTML snapshot of the conversation

use std::fmt::Write as _;
use std::time::Instant;

use super::{PageShell, PromptSet};
use crate::chat::ChatMessage;
use crate::render::{RenderOptions, escape_html, render_message, typing_indicator_html};

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:48rem;margin:0 auto;padding:1rem;background:#f8fafc;color:#0f172a}\
header{display:flex;justify-content:space-between;align-items:center;border-bottom:1px solid #e2e8f0;padding-bottom:.5rem}\
.message{display:flex;flex-direction:column;margin:1rem 0}\
.align-end{align-items:flex-end}.align-start{align-items:flex-start}\
.bubble{border-radius:1rem;padding:.75rem 1rem;max-width:80%}\
.user .bubble{background:#2563eb;color:#fff}.assistant .bubble{background:#fff;border:1px solid #e2e8f0}\
.pre{white-space:pre-wrap;margin:0}.label,.time{font-size:.75rem;color:#64748b}\
.actions button{font-size:.75rem;margin-right:.25rem}\
.references{font-size:.8rem;margin-top:.25rem}.references .heading{font-weight:600;margin:0}\
.prompts button{display:block;margin:.25rem 0}\
.dot{display:inline-block;width:.5rem;height:.5rem;margin:0 .1rem;border-radius:50%;background:#94a3b8}";

/// Render the whole page for `messages`
///
/// The welcome area with suggested prompts appears only while the
/// conversation holds nothing but the welcome message. The typing indicator
/// trails the list while `loading`.
#[must_use]
pub fn render_page(shell: &PageShell, messages: &[ChatMessage], loading: bool, now: Instant) -> String {
    let options = shell.options();
    let render = RenderOptions {
        markdown: options.markdown,
    };

    let mut html = String::from("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>Tax Assistant</title>\n");
    let _ = writeln!(html, "<style>{STYLE}</style>");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n<h1>Tax Assistant</h1>\n");
    if options.webhook_configurable {
        let current = shell.webhook_url().unwrap_or_default();
        let _ = writeln!(
            html,
            "<form class=\"settings\"><label>Webhook URL <input type=\"url\" name=\"webhook\" value=\"{}\"></label></form>",
            escape_html(current)
        );
    }
    html.push_str("</header>\n<main>\n");

    if PageShell::show_welcome(messages.len()) {
        html.push_str("<section class=\"prompts\">\n");
        match shell.prompts() {
            PromptSet::Flat(prompts) => {
                for prompt in prompts {
                    let _ = writeln!(html, "<button>{}</button>", escape_html(prompt));
                }
            }
            PromptSet::Categorized(categories) => {
                for category in categories {
                    let _ = writeln!(html, "<h2>{}</h2>", escape_html(category.title));
                    for prompt in category.prompts {
                        let _ = writeln!(html, "<button>{}</button>", escape_html(prompt));
                    }
                }
            }
        }
        html.push_str("</section>\n");
    }

    for message in messages {
        let bubble = render_message(message, &render);
        html.push_str(&bubble.to_html_with_copy_label(shell.copy_label(message.id, now)));
        html.push('\n');
    }

    if loading {
        html.push_str(&typing_indicator_html());
        html.push('\n');
    }

    html.push_str("</main>\n<footer class=\"hint\">Press Enter to send, Shift+Enter for a new line.</footer>\n");
    html.push_str("</body>\n</html>\n");
    html
}
