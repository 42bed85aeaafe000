//! Saving replies as text files

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::Result;

/// File name for a reply exported on `date`
#[must_use]
pub fn export_file_name(date: NaiveDate) -> String {
    format!("tax-response-{}.txt", date.format("%Y-%m-%d"))
}

/// Write `text` into `dir` under the dated export name
///
/// An existing file is never overwritten; ` (1)`, ` (2)`, ... is appended
/// to the stem instead.
///
/// # Errors
///
/// Returns error if the directory cannot be created or the file written
pub fn export_text(dir: &Path, text: &str, date: NaiveDate) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let name = export_file_name(date);
    let mut path = dir.join(&name);
    let stem = name.trim_end_matches(".txt");
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem} ({n}).txt"));
        n += 1;
    }

    std::fs::write(&path, text)?;
    tracing::info!(path = %path.display(), bytes = text.len(), "exported reply");
    Ok(path)
}
