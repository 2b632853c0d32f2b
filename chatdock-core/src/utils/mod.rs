//! Utility functions and helpers

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Marker appended to shortened titles and previews
pub const ELLIPSIS: &str = "...";

/// Expand a leading `~/` to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Create a safe filename from a string
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

/// Keep the first `max_chars` characters of `s` and append [`ELLIPSIS`].
///
/// Counts Unicode scalar values, so multi-byte text is never split.
/// With `only_when_truncated` unset the marker is appended even when
/// nothing was cut, which is how the widget renders session titles.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize, only_when_truncated: bool) -> String {
    let cut = match s.char_indices().nth(max_chars) {
        Some((end, _)) => &s[..end],
        None => s,
    };
    if only_when_truncated && cut.len() == s.len() {
        return cut.to_string();
    }
    format!("{}{}", cut, ELLIPSIS)
}

/// Day-granularity label used in the session list
pub fn relative_day_label(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now - timestamp).num_days();
    match days {
        d if d <= 0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        d if d < 7 => format!("{} days ago", d),
        _ => timestamp.format("%Y-%m-%d").to_string(),
    }
}
