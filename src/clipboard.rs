use arboard::Clipboard;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ClipboardError;

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s，。、！？「」]+").expect("valid regex"));

/// Reads the clipboard and pulls the first link out of it.
pub fn read_url() -> Result<String, ClipboardError> {
    let mut clipboard = Clipboard::new().map_err(|e| ClipboardError::Access(e.to_string()))?;
    let text = clipboard.get_text().map_err(|e| match e {
        arboard::Error::ContentNotAvailable => ClipboardError::NoUrl,
        other => ClipboardError::Access(other.to_string()),
    })?;
    extract_url(&text).ok_or(ClipboardError::NoUrl)
}

/// Share texts often wrap the link in prose; keep only the link.
pub fn extract_url(text: &str) -> Option<String> {
    URL.find(text.trim()).map(|m| m.as_str().to_string())
}
