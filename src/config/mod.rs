//! Configuration management for Overseer
//!
//! This module provides configuration loading and saving. Configuration is
//! read from `~/.overseer/config.json` with environment variable overrides
//! following the pattern `OVERSEER_SECTION_KEY`.

mod types;

pub use types::*;

use crate::error::Result;
use std::path::{Path, PathBuf};

impl Config {
    /// Returns the Overseer configuration directory path (`~/.overseer`).
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".overseer")
    }

    /// Returns the path to the config file (`~/.overseer/config.json`).
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Save configuration as pretty-printed JSON, creating parent
    /// directories as needed.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables follow the pattern `OVERSEER_SECTION_KEY`.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("OVERSEER_RATE_LIMIT_WINDOW_SECS") {
            if let Ok(v) = val.parse() {
                self.rate_limit.window_secs = v;
            }
        }
        if let Ok(val) = std::env::var("OVERSEER_RATE_LIMIT_MAX_CALLS") {
            if let Ok(v) = val.parse() {
                self.rate_limit.max_calls = v;
            }
        }
        if let Ok(val) = std::env::var("OVERSEER_HISTORY_KEEP_MAX") {
            if let Ok(v) = val.parse() {
                self.history.keep_max = v;
            }
        }
        if let Ok(val) = std::env::var("OVERSEER_CACHING_ENABLED") {
            if let Ok(v) = val.parse() {
                self.caching.enabled = v;
            }
        }
        if let Ok(val) = std::env::var("OVERSEER_DELEGATION_MAX_DEPTH") {
            if let Ok(v) = val.parse() {
                self.delegation.max_depth = v;
            }
        }
        if let Ok(val) = std::env::var("OVERSEER_LOGGING_LEVEL") {
            self.logging.level = val;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.history.keep_max, 25);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.caching.enabled = true;
        config.workflow.steps.push(WorkflowStep::new("answer", "Answer."));
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert!(loaded.caching.enabled);
        assert_eq!(loaded.workflow.steps.len(), 1);
        assert_eq!(loaded.workflow.steps[0].name, "answer");
    }

    #[test]
    fn test_load_invalid_json_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from_path(&path).is_err());
    }
}
