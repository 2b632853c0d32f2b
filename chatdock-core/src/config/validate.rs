//! Configuration validation rules.

use super::schema::Config;

const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();
    let history = &config.history;

    if history.storage_dir.trim().is_empty() {
        errors.push("history.storage_dir must not be empty".to_string());
    }
    if history.sessions_key.trim().is_empty() {
        errors.push("history.sessions_key must not be empty".to_string());
    }
    if history.active_key.trim().is_empty() {
        errors.push("history.active_key must not be empty".to_string());
    }
    if !history.sessions_key.trim().is_empty() && history.sessions_key == history.active_key {
        errors.push("history.sessions_key and history.active_key must differ".to_string());
    }
    if history.debounce_ms > MAX_DEBOUNCE_MS {
        errors.push(format!(
            "history.debounce_ms must be <= {}",
            MAX_DEBOUNCE_MS
        ));
    }
    if history.title_max_chars == 0 {
        errors.push("history.title_max_chars must be > 0".to_string());
    }
    if history.preview_max_chars == 0 {
        errors.push("history.preview_max_chars must be > 0".to_string());
    }

    let format = config.logging.format.to_ascii_lowercase();
    if format != "text" && format != "json" {
        errors.push(format!(
            "logging.format must be text or json, got {}",
            config.logging.format
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}
