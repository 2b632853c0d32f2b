//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for chatdock
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chat history configuration
    #[serde(default)]
    pub history: HistoryConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "~/.chatdock/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

/// Chat history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Directory backing the key-value store
    #[serde(default = "default_storage_dir")]
    pub storage_dir: String,
    /// Key holding the serialized session collection
    #[serde(default = "default_sessions_key")]
    pub sessions_key: String,
    /// Key holding the active session id
    #[serde(default = "default_active_key")]
    pub active_key: String,
    /// Quiet period before a mutation is written out
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Characters of the first user message kept in a session title
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
    /// Characters of the first user message kept in a session preview
    #[serde(default = "default_preview_max_chars")]
    pub preview_max_chars: usize,
    /// Append the ellipsis marker only when text was actually cut.
    /// Off by default: the widget always appends it.
    #[serde(default)]
    pub ellipsis_only_when_truncated: bool,
    /// Bot greeting shown at the top of a fresh conversation
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Whether fresh conversations start with the greeting
    #[serde(default = "default_true")]
    pub seed_greeting: bool,
}

pub const DEFAULT_SESSIONS_KEY: &str = "chat-history";
pub const DEFAULT_ACTIVE_KEY: &str = "current-chat-id";
pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;
pub const DEFAULT_TITLE_MAX_CHARS: usize = 50;
pub const DEFAULT_PREVIEW_MAX_CHARS: usize = 100;

fn default_storage_dir() -> String {
    "~/.chatdock/storage".to_string()
}

fn default_sessions_key() -> String {
    DEFAULT_SESSIONS_KEY.to_string()
}

fn default_active_key() -> String {
    DEFAULT_ACTIVE_KEY.to_string()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_title_max_chars() -> usize {
    DEFAULT_TITLE_MAX_CHARS
}

fn default_preview_max_chars() -> usize {
    DEFAULT_PREVIEW_MAX_CHARS
}

fn default_greeting() -> String {
    "👋 Hi! How can I help you today?".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            sessions_key: default_sessions_key(),
            active_key: default_active_key(),
            debounce_ms: default_debounce_ms(),
            title_max_chars: default_title_max_chars(),
            preview_max_chars: default_preview_max_chars(),
            ellipsis_only_when_truncated: false,
            greeting: default_greeting(),
            seed_greeting: true,
        }
    }
}

impl HistoryConfig {
    /// Debounce window as a [`std::time::Duration`]
    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_defaults_match_widget() {
        let history = HistoryConfig::default();
        assert_eq!(history.sessions_key, "chat-history");
        assert_eq!(history.active_key, "current-chat-id");
        assert_eq!(history.debounce_ms, 1000);
        assert_eq!(history.title_max_chars, 50);
        assert_eq!(history.preview_max_chars, 100);
        assert!(!history.ellipsis_only_when_truncated);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"history":{"debounce_ms":250}}"#).unwrap();
        assert_eq!(config.history.debounce_ms, 250);
        assert_eq!(config.history.title_max_chars, 50);
        assert_eq!(config.logging.level, "info");
    }
}
