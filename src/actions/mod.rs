//! Message affordances: copy and export

mod clipboard;
mod export;

pub use clipboard::{
    COPY_ACK_DURATION, Clipboard, CopyFeedback, CopyMethod, SystemClipboard, TerminalClipboard,
    copy_with_fallback, osc52_sequence,
};
pub use export::{export_file_name, export_text};
