//! Lightweight markdown to HTML
//!
//! Covers what assistant replies use: headings, bullet and numbered lists,
//! paragraphs, fenced code, `**bold**`, `*italic*`, `` `code` `` and
//! `[text](url)` links.
//!
//! All input is HTML-escaped before formatting is applied, so embedded
//! markup renders as text. Links are only emitted for `http`, `https` and
//! `mailto` targets; anything else stays literal.

/// Convert markdown text to an HTML fragment
#[must_use]
pub fn markdown_to_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 4);
    let mut paragraph: Vec<&str> = Vec::new();
    let mut list: Option<ListKind> = None;
    let mut lines = input.lines().peekable();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") {
            flush_paragraph(&mut out, &mut paragraph);
            close_list(&mut out, &mut list);

            let mut code = Vec::new();
            for next in lines.by_ref() {
                if next.trim_start().starts_with("```") {
                    break;
                }
                code.push(next);
            }
            out.push_str("<pre><code>");
            out.push_str(&escape_html(&code.join("\n")));
            out.push_str("</code></pre>\n");
            continue;
        }

        if trimmed.is_empty() {
            flush_paragraph(&mut out, &mut paragraph);
            close_list(&mut out, &mut list);
            continue;
        }

        if let Some((level, text)) = heading(trimmed) {
            flush_paragraph(&mut out, &mut paragraph);
            close_list(&mut out, &mut list);
            out.push_str(&format!("<h{level}>{}</h{level}>\n", inline(text)));
            continue;
        }

        if let Some((kind, item)) = list_item(trimmed) {
            flush_paragraph(&mut out, &mut paragraph);
            if list != Some(kind) {
                close_list(&mut out, &mut list);
                out.push_str(kind.open());
                list = Some(kind);
            }
            out.push_str(&format!("<li>{}</li>\n", inline(item)));
            continue;
        }

        close_list(&mut out, &mut list);
        paragraph.push(trimmed);
    }

    flush_paragraph(&mut out, &mut paragraph);
    close_list(&mut out, &mut list);

    if out.ends_with('\n') {
        out.pop();
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Numbered,
}

impl ListKind {
    const fn open(self) -> &'static str {
        match self {
            Self::Bullet => "<ul>\n",
            Self::Numbered => "<ol>\n",
        }
    }

    const fn close(self) -> &'static str {
        match self {
            Self::Bullet => "</ul>\n",
            Self::Numbered => "</ol>\n",
        }
    }
}

fn flush_paragraph(out: &mut String, paragraph: &mut Vec<&str>) {
    if paragraph.is_empty() {
        return;
    }
    let body: Vec<String> = paragraph.iter().map(|l| inline(l)).collect();
    out.push_str(&format!("<p>{}</p>\n", body.join("<br>")));
    paragraph.clear();
}

fn close_list(out: &mut String, list: &mut Option<ListKind>) {
    if let Some(kind) = list.take() {
        out.push_str(kind.close());
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    line[level..].strip_prefix(' ').map(|text| (level, text.trim()))
}

fn list_item(line: &str) -> Option<(ListKind, &str)> {
    for marker in ["- ", "* ", "+ "] {
        if let Some(item) = line.strip_prefix(marker) {
            return Some((ListKind::Bullet, item));
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..]
        .strip_prefix(". ")
        .or_else(|| line[digits..].strip_prefix(") "))
        .map(|item| (ListKind::Numbered, item))
}

/// Escape HTML special characters
#[must_use]
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Escape, then convert inline formatting
fn inline(text: &str) -> String {
    let escaped = escape_html(text);
    let mut out = String::with_capacity(escaped.len());

    // code spans are emitted verbatim; formatting applies between them
    for (i, segment) in escaped.split('`').enumerate() {
        if i % 2 == 1 {
            out.push_str("<code>");
            out.push_str(segment);
            out.push_str("</code>");
        } else {
            out.push_str(&convert_links(segment));
        }
    }

    // an odd number of backticks leaves the last one unmatched
    if escaped.matches('`').count() % 2 == 1 {
        if let Some(pos) = out.rfind("<code>") {
            out.replace_range(pos..pos + "<code>".len(), "`");
            if out.ends_with("</code>") {
                out.truncate(out.len() - "</code>".len());
            }
        }
    }

    out
}

/// Bold and italic markers
fn emphasis(text: &str) -> String {
    let formatted = convert_delimited(text, "**", "<strong>", "</strong>");
    let formatted = convert_delimited(&formatted, "__", "<strong>", "</strong>");
    convert_delimited(&formatted, "*", "<em>", "</em>")
}

/// Replace matched `delim ... delim` pairs with the given tags
fn convert_delimited(text: &str, delim: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(delim) {
        let after = &rest[start + delim.len()..];
        match after.find(delim) {
            Some(end) if end > 0 && !after.starts_with(' ') => {
                out.push_str(&rest[..start]);
                out.push_str(open);
                out.push_str(&after[..end]);
                out.push_str(close);
                rest = &after[end + delim.len()..];
            }
            _ => {
                out.push_str(&rest[..start + delim.len()]);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Convert `[text](url)` for allowed schemes
///
/// Emphasis applies to the label and the surrounding text, never to the
/// target.
fn convert_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut plain = String::new();
    let mut rest = text;

    while let Some(open) = rest.find('[') {
        plain.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        if let Some(mid) = after.find("](") {
            let label = &after[..mid];
            let target_start = &after[mid + 2..];
            if let Some(close) = target_start.find(')') {
                let url = &target_start[..close];
                if is_safe_link(url) {
                    out.push_str(&emphasis(&plain));
                    plain.clear();
                    out.push_str(&format!(
                        "<a href=\"{url}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>",
                        emphasis(label)
                    ));
                    rest = &target_start[close + 1..];
                    continue;
                }
            }
        }

        plain.push('[');
        rest = after;
    }

    plain.push_str(rest);
    out.push_str(&emphasis(&plain));
    out
}

/// Whether a link target may be emitted as an anchor
#[must_use]
pub fn is_safe_link(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    ["http://", "https://", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}
