use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SessionError};

pub const EMPTY_URL_MESSAGE: &str = "Please enter a YouTube URL";
pub const INVALID_URL_MESSAGE: &str = "Please enter a valid YouTube URL";

static ACCEPTED_URLS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^(https?://)?(www\.|m\.|music\.)?(youtube\.com/(watch\?v=|embed/|v/|shorts/)|youtu\.be/)[\w-]+",
        r"^(https?://)?(www\.|m\.|music\.)?youtube\.com/watch\?(.*&)?v=[\w-]+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("url pattern compiles"))
    .collect()
});

/// Syntactic check only; the backend may still be unable to resolve it.
pub fn is_supported_url(url: &str) -> bool {
    ACCEPTED_URLS.iter().any(|re| re.is_match(url))
}

/// Trims the pasted text and returns it if it looks like a video URL.
pub fn validate_url(input: &str) -> Result<String> {
    let url = input.trim();
    if url.is_empty() {
        return Err(SessionError::Validation(EMPTY_URL_MESSAGE.to_string()));
    }
    if !is_supported_url(url) {
        return Err(SessionError::Validation(INVALID_URL_MESSAGE.to_string()));
    }
    Ok(url.to_string())
}
