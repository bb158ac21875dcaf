//! Source content loading.

use std::path::Path;

use crate::error::SessionError;

/// Read exam source content from a plain-text file.
///
/// Only UTF-8 text is supported. PDFs and unreadable or empty files are
/// reported as [`SessionError::Content`].
pub fn load_content(path: &Path) -> Result<String, SessionError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    if extension.as_deref() == Some("pdf") {
        return Err(SessionError::Content(format!(
            "{}: PDF sources are not supported, convert to .txt first",
            path.display()
        )));
    }

    let text = std::fs::read_to_string(path)
        .map_err(|e| SessionError::Content(format!("failed to read {}: {e}", path.display())))?;

    if text.trim().is_empty() {
        return Err(SessionError::Content(format!(
            "{} contains no text",
            path.display()
        )));
    }

    Ok(text)
}

/// Keep at most `limit` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
