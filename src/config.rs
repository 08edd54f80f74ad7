use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::category::Category;

/// Application configuration (`~/.hotword-engine.toml`)
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Engine limits
    #[serde(default)]
    pub engine: EngineConfig,
    /// Dictionary file locations
    #[serde(default)]
    pub dictionaries: DictionariesConfig,
    /// Change polling
    #[serde(default)]
    pub watch: WatchConfig,
    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Limits enforced by the hot-word engine
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Inputs longer than this (in chars) are returned unchanged
    pub max_text_chars: usize,
    /// Wall-clock budget for one `process_text` call
    pub total_budget_ms: u64,
    /// Timeout for a single pattern worker
    pub pattern_timeout_ms: u64,
    /// Cap on substitutions per literal key per call
    pub max_replacements_per_key: usize,
    /// Number of patterns kept in the regex cache
    pub regex_cache_capacity: usize,
    /// Longest accepted pattern (in chars)
    pub max_pattern_length: usize,
    /// Deepest accepted group nesting
    pub max_group_depth: usize,
    /// Entries accepted per category on reload
    pub max_entries_per_category: usize,
    /// Pattern workers allowed to be outstanding at once
    pub max_pending_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_text_chars: 10_000,
            total_budget_ms: 5_000,
            pattern_timeout_ms: 2_000,
            max_replacements_per_key: 100,
            regex_cache_capacity: 100,
            max_pattern_length: 500,
            max_group_depth: 10,
            max_entries_per_category: 10_000,
            max_pending_workers: 4,
        }
    }
}

impl EngineConfig {
    /// Overall budget as a `Duration`
    #[must_use]
    pub const fn total_budget(&self) -> Duration {
        Duration::from_millis(self.total_budget_ms)
    }

    /// Per-pattern timeout as a `Duration`
    #[must_use]
    pub const fn pattern_timeout(&self) -> Duration {
        Duration::from_millis(self.pattern_timeout_ms)
    }
}

/// One optional file per loadable category
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DictionariesConfig {
    /// Directory all dictionary paths must resolve into
    pub base_dir: Option<String>,
    /// Regex rule file
    pub rule: Option<String>,
    /// Primary-language dictionary
    pub primary: Option<String>,
    /// Secondary-language dictionary
    pub secondary: Option<String>,
}

impl DictionariesConfig {
    /// Configured path for `category`, if any
    #[must_use]
    pub fn path_for(&self, category: Category) -> Option<&str> {
        match category {
            Category::Rule => self.rule.as_deref(),
            Category::Primary => self.primary.as_deref(),
            Category::Secondary => self.secondary.as_deref(),
            Category::Runtime => None,
        }
    }
}

/// Change polling settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WatchConfig {
    /// Poll for changes at all
    pub enabled: bool,
    /// How often modification times are checked
    pub poll_interval_ms: u64,
    /// Minimum gap between two reloads of the same file
    pub throttle_ms: u64,
    /// Accepted file extensions (without the dot)
    pub allowed_extensions: Vec<String>,
    /// Largest file that will be read
    pub max_file_bytes: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 500,
            throttle_ms: 1_000,
            allowed_extensions: vec!["txt".to_owned(), "dict".to_owned()],
            max_file_bytes: 1024 * 1024,
        }
    }
}

/// Logging settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Write logs to `log_path` instead of stderr
    pub enabled: bool,
    /// Log file location
    pub log_path: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_path: "~/.hotword-engine/engine.log".to_owned(),
        }
    }
}

impl Config {
    /// Load config from ~/.hotword-engine.toml
    ///
    /// # Errors
    /// Returns error if HOME is unset or the file cannot be read or parsed
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default(&config_path).context("failed to create default config")?;
        }

        let contents = fs::read_to_string(&config_path).context("failed to read config file")?;

        Self::parse(&contents)
    }

    /// Parse config from TOML text
    ///
    /// # Errors
    /// Returns error if the TOML is malformed
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse config TOML")
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".hotword-engine.toml"))
    }

    fn create_default(path: &PathBuf) -> Result<()> {
        let default_config = r#"[engine]
max_text_chars = 10000
total_budget_ms = 5000
pattern_timeout_ms = 2000
max_replacements_per_key = 100
regex_cache_capacity = 100

[dictionaries]
base_dir = "~/.hotword-engine"
rule = "~/.hotword-engine/hot-rule.txt"
primary = "~/.hotword-engine/hot-zh.txt"
secondary = "~/.hotword-engine/hot-en.txt"

[watch]
enabled = true
poll_interval_ms = 500
throttle_ms = 1000

[telemetry]
enabled = false
log_path = "~/.hotword-engine/engine.log"
"#;
        fs::write(path, default_config).context("failed to write default config")?;
        Ok(())
    }

    /// Expand ~ in paths to home directory
    ///
    /// # Errors
    /// Returns error if the path starts with `~/` and HOME is unset
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(stripped) = path.strip_prefix("~/") {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            Ok(PathBuf::from(home).join(stripped))
        } else {
            Ok(PathBuf::from(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.max_text_chars, 10_000);
        assert_eq!(config.engine.max_replacements_per_key, 100);
        assert!(config.dictionaries.primary.is_none());
        assert!(config.watch.enabled);
    }

    #[test]
    fn test_partial_engine_section() {
        let config = Config::parse(
            r#"
[engine]
pattern_timeout_ms = 250

[dictionaries]
primary = "/tmp/hot-zh.txt"
"#,
        )
        .unwrap();

        assert_eq!(config.engine.pattern_timeout(), Duration::from_millis(250));
        assert_eq!(config.engine.total_budget(), Duration::from_secs(5));
        assert_eq!(
            config.dictionaries.path_for(Category::Primary),
            Some("/tmp/hot-zh.txt")
        );
        assert_eq!(config.dictionaries.path_for(Category::Runtime), None);
    }

    #[test]
    fn test_malformed_config() {
        assert!(Config::parse("[engine\nmax_text_chars = ").is_err());
    }

    #[test]
    fn test_expand_path() {
        let home = std::env::var("HOME").unwrap();
        assert_eq!(
            Config::expand_path("~/dict/hot.txt").unwrap(),
            PathBuf::from(home).join("dict/hot.txt")
        );
        assert_eq!(
            Config::expand_path("/etc/hot.txt").unwrap(),
            PathBuf::from("/etc/hot.txt")
        );
    }
}
