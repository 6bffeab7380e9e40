//! Configuration management for trapscan
//!
//! Config stored at: ~/.config/trapscan/config.json

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use trapscan_types::{ConfigError, OutputFormat, Result};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Command line of the external vision oracle CLI
    #[serde(default = "default_oracle_command")]
    pub oracle_command: String,

    /// Model name override (optional)
    #[serde(default)]
    pub model: Option<String>,

    /// Oracle passes issued per category per scan
    #[serde(default = "default_passes_per_scan")]
    pub passes_per_scan: u32,

    /// Per-pass timeout in seconds
    #[serde(default = "default_pass_timeout_secs")]
    pub pass_timeout_secs: u64,

    /// Week start weekday for trend buckets (monday..sunday)
    #[serde(default = "default_week_start")]
    pub week_start: String,

    /// Default output format (json, table)
    #[serde(default)]
    pub output_format: OutputFormat,

    /// Store directory override
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
}

fn default_oracle_command() -> String {
    "gemini-vision".to_string()
}

fn default_passes_per_scan() -> u32 {
    3
}

fn default_pass_timeout_secs() -> u64 {
    60
}

fn default_week_start() -> String {
    "monday".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            oracle_command: default_oracle_command(),
            model: None,
            passes_per_scan: default_passes_per_scan(),
            pass_timeout_secs: default_pass_timeout_secs(),
            week_start: default_week_start(),
            output_format: OutputFormat::default(),
            store_dir: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NotFound)?
            .join("trapscan");
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Get the record store directory
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.store_dir {
            return Ok(dir.clone());
        }

        let store_dir = dirs::data_dir()
            .ok_or(ConfigError::NotFound)?
            .join("trapscan");
        Ok(store_dir)
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| ConfigError::SaveError(e.to_string()))?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(Self::config_path()?, content)
            .map_err(|e| ConfigError::SaveError(e.to_string()))?;
        Ok(())
    }

    /// Parse the configured week start, falling back to Monday
    pub fn week_start_weekday(&self) -> Weekday {
        parse_weekday(&self.week_start).unwrap_or(Weekday::Mon)
    }
}

/// Parse a weekday name (full or three-letter, case-insensitive)
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    match name.to_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.passes_per_scan, 3);
        assert_eq!(config.pass_timeout_secs, 60);
        assert_eq!(config.week_start_weekday(), Weekday::Mon);
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("Sunday"), Some(Weekday::Sun));
        assert_eq!(parse_weekday("wed"), Some(Weekday::Wed));
        assert_eq!(parse_weekday("noday"), None);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"oracle_command": "claude-vision --json"}"#).unwrap();
        assert_eq!(config.oracle_command, "claude-vision --json");
        assert_eq!(config.passes_per_scan, 3);
    }
}
