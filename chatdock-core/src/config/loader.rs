//! Configuration loading and management

use super::schema::Config;
use super::validate::validate_config;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CHATDOCK__";

/// Configuration loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".chatdock"))
            .unwrap_or_else(|| PathBuf::from(".chatdock"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from file and environment
    pub fn load(&self) -> crate::Result<Config> {
        let config_path = self.config_path();
        let mut merged = serde_json::to_value(Config::default())?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file_value: Value = serde_json::from_str(&content)?;
            merge_values(&mut merged, file_value);
        }

        apply_env_overrides(&mut merged)?;

        let config: Config = serde_json::from_value(merged)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> crate::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), content)?;
        Ok(())
    }

    /// Path of the config file inside the config directory
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Overlay `overlay` onto `base`; objects merge per key, anything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    let overlay = match overlay {
        Value::Object(fields) => fields,
        other => {
            *base = other;
            return;
        }
    };
    let Some(fields) = base.as_object_mut() else {
        *base = Value::Object(overlay);
        return;
    };

    for (key, value) in overlay {
        match fields.get_mut(&key) {
            Some(slot) => merge_values(slot, value),
            None => {
                fields.insert(key, value);
            }
        }
    }
}

/// Apply `CHATDOCK__SECTION__FIELD=value` variables.
///
/// The value takes the type of the setting it replaces: flags accept
/// `true`/`false`, counts and durations accept unsigned integers, and
/// everything else (including new map entries) is kept as text.
fn apply_env_overrides(config: &mut Value) -> crate::Result<()> {
    for (var, raw) in std::env::vars() {
        let Some(path) = var.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = path
            .split("__")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_ascii_lowercase())
            .collect();
        let Some((field, sections)) = segments.split_last() else {
            continue;
        };

        let mut target = &mut *config;
        for section in sections {
            target = match target {
                Value::Object(fields) => fields
                    .entry(section.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                _ => {
                    return Err(crate::Error::Validation(format!(
                        "{}: {} is not a config section",
                        var, section
                    )))
                }
            };
        }
        let Value::Object(fields) = target else {
            return Err(crate::Error::Validation(format!(
                "{}: path does not name a config field",
                var
            )));
        };

        let value = typed_like(fields.get(field.as_str()), &var, raw)?;
        fields.insert(field.clone(), value);
    }
    Ok(())
}

fn typed_like(current: Option<&Value>, var: &str, raw: String) -> crate::Result<Value> {
    let text = raw.trim();
    match current {
        Some(Value::Bool(_)) if text.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
        Some(Value::Bool(_)) if text.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
        Some(Value::Bool(_)) => Err(crate::Error::Validation(format!(
            "{}: expected true or false, got {:?}",
            var, raw
        ))),
        Some(Value::Number(_)) => text.parse::<u64>().map(Value::from).map_err(|_| {
            crate::Error::Validation(format!(
                "{}: expected a non-negative integer, got {:?}",
                var, raw
            ))
        }),
        _ => Ok(Value::String(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    /// Run `f` with `vars` set, restoring the previous environment afterwards.
    /// Every test that loads config goes through here so env changes never overlap.
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        let saved: Vec<(&str, Option<String>)> = vars
            .iter()
            .map(|(key, _)| (*key, std::env::var(key).ok()))
            .collect();
        for (key, value) in vars {
            std::env::set_var(key, value);
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(f));

        for (key, original) in saved {
            match original {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
        outcome.unwrap_or_else(|payload| panic::resume_unwind(payload))
    }

    fn load_from(dir: &Path) -> crate::Result<Config> {
        ConfigLoader::with_dir(dir).load()
    }

    #[test]
    fn test_load_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = with_env(&[], || load_from(temp_dir.path())).unwrap();

        assert_eq!(config.history.sessions_key, "chat-history");
        assert_eq!(config.history.debounce_ms, 1000);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());

        let mut config = Config::default();
        config.history.title_max_chars = 32;
        loader.save(&config).unwrap();

        let loaded = with_env(&[], || loader.load()).unwrap();
        assert_eq!(loaded.history.title_max_chars, 32);
    }

    #[test]
    fn test_file_values_merge_over_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        std::fs::write(
            loader.config_path(),
            r#"{"history":{"preview_max_chars":80},"logging":{"format":"json"}}"#,
        )
        .unwrap();

        let config = with_env(&[], || loader.load()).unwrap();
        assert_eq!(config.history.preview_max_chars, 80);
        assert_eq!(config.history.title_max_chars, 50);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_env_values_take_the_setting_type() {
        let temp_dir = TempDir::new().unwrap();
        let config = with_env(
            &[
                ("CHATDOCK__HISTORY__DEBOUNCE_MS", "250"),
                ("CHATDOCK__HISTORY__ELLIPSIS_ONLY_WHEN_TRUNCATED", "TRUE"),
                ("CHATDOCK__HISTORY__ACTIVE_KEY", "42"),
                ("CHATDOCK__LOGGING__OVERRIDES__HYPER", "warn"),
            ],
            || load_from(temp_dir.path()),
        )
        .unwrap();

        assert_eq!(config.history.debounce_ms, 250);
        assert!(config.history.ellipsis_only_when_truncated);
        assert_eq!(config.history.active_key, "42");
        assert_eq!(
            config.logging.overrides.get("hyper").map(String::as_str),
            Some("warn")
        );
    }

    #[test]
    fn test_env_value_of_wrong_type_names_the_variable() {
        let temp_dir = TempDir::new().unwrap();

        let err = with_env(&[("CHATDOCK__HISTORY__SEED_GREETING", "sometimes")], || {
            load_from(temp_dir.path())
        })
        .unwrap_err();
        assert!(matches!(err, crate::Error::Validation(_)));
        assert!(err.to_string().contains("CHATDOCK__HISTORY__SEED_GREETING"));

        let err = with_env(&[("CHATDOCK__HISTORY__DEBOUNCE_MS", "-5")], || {
            load_from(temp_dir.path())
        })
        .unwrap_err();
        assert!(err.to_string().contains("non-negative integer"));
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        std::fs::write(loader.config_path(), r#"{"logging":{"level":"warn"}}"#).unwrap();

        let config =
            with_env(&[("CHATDOCK__LOGGING__LEVEL", "debug")], || loader.load()).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_zero_title_length() {
        let temp_dir = TempDir::new().unwrap();
        let err = with_env(&[("CHATDOCK__HISTORY__TITLE_MAX_CHARS", "0")], || {
            load_from(temp_dir.path())
        })
        .unwrap_err();
        assert!(err.to_string().contains("title_max_chars"));
    }
}
