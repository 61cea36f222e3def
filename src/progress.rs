use once_cell::sync::Lazy;
use regex::Regex;

static PERCENT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("percent pattern compiles"));

// yt-dlp colours its percent string when the backend runs on a tty.
static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ansi pattern compiles"));

/// Pulls the first integer or decimal out of a percent string, clamped to 0..=100.
///
/// `"45.2%"` gives `Some(45.2)`; `"N/A"` gives `None`.
pub fn parse_percent(text: &str) -> Option<f32> {
    let plain = ANSI_ESCAPE.replace_all(text, "");
    let number = PERCENT_NUMBER.captures(&plain)?.get(1)?;
    let value: f32 = number.as_str().parse().ok()?;
    Some(value.clamp(0.0, 100.0))
}
