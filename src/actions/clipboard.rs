//! Copying replies to the clipboard
//!
//! The system clipboard is tried first. When it is missing (headless
//! session, SSH) the text is sent to the terminal as an OSC 52 sequence,
//! which most terminal emulators turn into a clipboard write.

use std::io::Write;
use std::time::{Duration, Instant};

use base64::Engine as _;

use crate::{Error, Result};

/// How long the "Copied" acknowledgment stays up
pub const COPY_ACK_DURATION: Duration = Duration::from_secs(2);

/// A place text can be copied to
pub trait Clipboard {
    /// Replace the clipboard contents
    ///
    /// # Errors
    ///
    /// Returns error if the clipboard cannot be written
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// The desktop clipboard
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    /// Connect to the desktop clipboard
    ///
    /// # Errors
    ///
    /// Returns error if no clipboard is reachable
    pub fn new() -> Result<Self> {
        let inner = arboard::Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.inner
            .set_text(text)
            .map_err(|e| Error::Clipboard(e.to_string()))
    }
}

/// Clipboard write through the terminal's OSC 52 escape sequence
pub struct TerminalClipboard<W: Write> {
    out: W,
}

impl<W: Write> TerminalClipboard<W> {
    /// Write escape sequences to `out`
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Clipboard for TerminalClipboard<W> {
    fn set_text(&mut self, text: &str) -> Result<()> {
        write!(self.out, "{}", osc52_sequence(text))?;
        self.out.flush()?;
        Ok(())
    }
}

/// OSC 52 "set clipboard" sequence for `text`
#[must_use]
pub fn osc52_sequence(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text);
    format!("\x1b]52;c;{encoded}\x07")
}

/// Which clipboard ended up holding the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    /// Desktop clipboard
    System,
    /// Terminal escape sequence
    Terminal,
}

/// Copy `text`, falling back when the primary clipboard is missing or fails
///
/// # Errors
///
/// Returns error only if the fallback also fails
pub fn copy_with_fallback(
    primary: Option<&mut dyn Clipboard>,
    fallback: &mut dyn Clipboard,
    text: &str,
) -> Result<CopyMethod> {
    if let Some(clipboard) = primary {
        match clipboard.set_text(text) {
            Ok(()) => return Ok(CopyMethod::System),
            Err(e) => tracing::debug!(error = %e, "system clipboard failed, using terminal fallback"),
        }
    }

    fallback.set_text(text)?;
    Ok(CopyMethod::Terminal)
}

/// Transient "Copied" acknowledgment
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyFeedback {
    copied_at: Option<Instant>,
}

impl CopyFeedback {
    /// Record a successful copy at `now`
    pub const fn mark(&mut self, now: Instant) {
        self.copied_at = Some(now);
    }

    /// Whether the acknowledgment is showing at `now`
    #[must_use]
    pub fn is_active(&self, now: Instant) -> bool {
        self.copied_at
            .is_some_and(|at| now.saturating_duration_since(at) < COPY_ACK_DURATION)
    }

    /// Button label at `now`
    #[must_use]
    pub fn label(&self, now: Instant) -> &'static str {
        if self.is_active(now) { "Copied" } else { "Copy" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        text: Option<String>,
        fail: bool,
    }

    impl Clipboard for Recording {
        fn set_text(&mut self, text: &str) -> Result<()> {
            if self.fail {
                return Err(Error::Clipboard("unavailable".into()));
            }
            self.text = Some(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn copies_to_primary() {
        let mut primary = Recording::default();
        let mut fallback = Recording::default();
        let method = copy_with_fallback(Some(&mut primary), &mut fallback, "Hello").unwrap();
        assert_eq!(method, CopyMethod::System);
        assert_eq!(primary.text.as_deref(), Some("Hello"));
        assert_eq!(fallback.text, None);
    }

    #[test]
    fn falls_back_on_failure() {
        let mut primary = Recording {
            fail: true,
            ..Recording::default()
        };
        let mut fallback = Recording::default();
        let method = copy_with_fallback(Some(&mut primary), &mut fallback, "Hello").unwrap();
        assert_eq!(method, CopyMethod::Terminal);
        assert_eq!(fallback.text.as_deref(), Some("Hello"));
    }

    #[test]
    fn falls_back_when_missing() {
        let mut fallback = TerminalClipboard::new(Vec::new());
        copy_with_fallback(None, &mut fallback, "Hello").unwrap();
        let written = String::from_utf8(fallback.into_inner()).unwrap();
        assert_eq!(written, "\x1b]52;c;SGVsbG8=\x07");
    }

    #[test]
    fn feedback_reverts_after_two_seconds() {
        let start = Instant::now();
        let mut feedback = CopyFeedback::default();
        assert_eq!(feedback.label(start), "Copy");

        feedback.mark(start);
        assert_eq!(feedback.label(start), "Copied");
        assert!(feedback.is_active(start + Duration::from_millis(1999)));
        assert!(!feedback.is_active(start + COPY_ACK_DURATION));
        assert_eq!(feedback.label(start + Duration::from_secs(3)), "Copy");
    }
}
