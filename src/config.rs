//! Flat key=value configuration files.
//!
//! One `key=value` per line, whitespace trimmed around both sides. Lines
//! without `=` and entries over the fixed limits are skipped. No comments,
//! no sections: the format is meant for a handful of engine toggles.

use std::path::Path;

use crate::api::error::ConfigError;

/// Maximum entries per file.
pub const MAX_CONFIG_ENTRIES: usize = 64;

/// Maximum key length in bytes.
pub const MAX_KEY_LENGTH: usize = 32;

/// Maximum value length in bytes.
pub const MAX_VALUE_LENGTH: usize = 64;

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    value: String,
}

/// An in-memory key=value table.
#[derive(Debug, Clone, Default)]
pub struct Config {
    entries: Vec<Entry>,
}

impl Config {
    /// Empty config.
    pub fn new() -> Config {
        Config::default()
    }

    /// Load from a file, skipping malformed and overlong lines.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Parse config text.
    pub fn parse(text: &str) -> Config {
        let mut config = Config::new();
        for line in text.lines() {
            if config.entries.len() >= MAX_CONFIG_ENTRIES {
                break;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || key.len() >= MAX_KEY_LENGTH || value.len() >= MAX_VALUE_LENGTH {
                continue;
            }
            config.entries.push(Entry {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        config
    }

    /// Write the table back out as `key=value` lines.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&entry.key);
            text.push('=');
            text.push_str(&entry.value);
            text.push('\n');
        }
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// String value for `key`, or the default.
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
            .unwrap_or(default)
    }

    /// Integer value for `key`, or the default when missing or unparsable.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .and_then(|e| e.value.parse().ok())
            .unwrap_or(default)
    }

    /// Boolean value for `key` (`true` or `1`), or the default.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value == "true" || e.value == "1")
            .unwrap_or(default)
    }

    /// Insert or update a string entry.
    pub fn set_str(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        if key.len() >= MAX_KEY_LENGTH || value.len() >= MAX_VALUE_LENGTH {
            return Err(ConfigError::EntryTooLong(key.to_string()));
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.value = value.to_string();
            return Ok(());
        }
        if self.entries.len() >= MAX_CONFIG_ENTRIES {
            return Err(ConfigError::TableFull);
        }
        self.entries.push(Entry {
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    /// Insert or update an integer entry.
    pub fn set_int(&mut self, key: &str, value: i64) -> Result<(), ConfigError> {
        self.set_str(key, &value.to_string())
    }

    /// Insert or update a boolean entry.
    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<(), ConfigError> {
        self.set_str(key, if value { "true" } else { "false" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let config = Config::parse("  width = 1920 \n height=1080\n");
        assert_eq!(config.get_int("width", 0), 1920);
        assert_eq!(config.get_int("height", 0), 1080);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let config = Config::parse("no equals sign\nvalid=1\n\n=no key\n");
        assert_eq!(config.len(), 1);
        assert_eq!(config.get_int("valid", 0), 1);
    }

    #[test]
    fn test_overlong_entries_skipped() {
        let long_key = "k".repeat(MAX_KEY_LENGTH);
        let text = format!("{}=1\nok=2\n", long_key);
        let config = Config::parse(&text);
        assert_eq!(config.len(), 1);
        assert_eq!(config.get_int("ok", 0), 2);
    }

    #[test]
    fn test_entry_cap() {
        let mut text = String::new();
        for i in 0..(MAX_CONFIG_ENTRIES + 10) {
            text.push_str(&format!("key{}={}\n", i, i));
        }
        let config = Config::parse(&text);
        assert_eq!(config.len(), MAX_CONFIG_ENTRIES);
    }

    #[test]
    fn test_bool_accessor() {
        let config = Config::parse("vsync=true\nfullscreen=1\nshadows=no\n");
        assert!(config.get_bool("vsync", false));
        assert!(config.get_bool("fullscreen", false));
        assert!(!config.get_bool("shadows", true));
        assert!(config.get_bool("missing", true));
    }

    #[test]
    fn test_str_default() {
        let config = Config::parse("renderer=vulkan\n");
        assert_eq!(config.get_str("renderer", "gl"), "vulkan");
        assert_eq!(config.get_str("audio", "null"), "null");
    }

    #[test]
    fn test_set_updates_existing() {
        let mut config = Config::new();
        config.set_int("width", 800).unwrap();
        config.set_int("width", 1920).unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(config.get_int("width", 0), 1920);
    }

    #[test]
    fn test_set_rejects_overlong() {
        let mut config = Config::new();
        let long_value = "v".repeat(MAX_VALUE_LENGTH);
        assert!(config.set_str("key", &long_value).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let mut config = Config::new();
        config.set_str("renderer", "vulkan").unwrap();
        config.set_int("width", 1920).unwrap();
        config.set_bool("vsync", true).unwrap();

        let dir = std::env::temp_dir().join("taskweave-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("engine.cfg");
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.get_str("renderer", ""), "vulkan");
        assert_eq!(loaded.get_int("width", 0), 1920);
        assert!(loaded.get_bool("vsync", false));
        std::fs::remove_file(&path).ok();
    }
}
