/*!
 * Configuration support for the Part D library
 *
 * Provides runtime configuration options for customizing loader and report
 * behavior.
 */

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::reader::SnapshotReader;

/// Global configuration for the Part D library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartdConfig {
    /// Candidate text encodings, attempted in order when decoding input files
    #[serde(default = "default_encodings")]
    pub encodings: Vec<String>,

    /// Field delimiter of the input files (ASCII)
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Rounding precision for plan-joined report metrics
    #[serde(default = "default_plan_report_decimals")]
    pub plan_report_decimals: u32,

    /// Rounding precision for formulary-only (NDC-level) report metrics
    #[serde(default = "default_ndc_report_decimals")]
    pub ndc_report_decimals: u32,

    /// Whether to skip invalid rows during parsing
    #[serde(default)]
    pub skip_invalid_records: bool,

    /// Whether to show progress while loading snapshot files
    #[serde(default = "default_enable_progress_bar")]
    pub enable_progress_bar: bool,

    /// Default export format for series reports
    #[serde(default)]
    pub default_export_format: crate::ExportFormat,
}

impl Default for PartdConfig {
    fn default() -> Self {
        Self {
            encodings: default_encodings(),
            delimiter: default_delimiter(),
            plan_report_decimals: default_plan_report_decimals(),
            ndc_report_decimals: default_ndc_report_decimals(),
            skip_invalid_records: false,
            enable_progress_bar: default_enable_progress_bar(),
            default_export_format: crate::ExportFormat::Csv,
        }
    }
}

// Default value functions for serde
fn default_encodings() -> Vec<String> {
    crate::constants::DEFAULT_ENCODINGS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_delimiter() -> char {
    crate::constants::FIELD_DELIMITER as char
}

fn default_plan_report_decimals() -> u32 {
    crate::constants::PLAN_REPORT_DECIMALS
}

fn default_ndc_report_decimals() -> u32 {
    crate::constants::NDC_REPORT_DECIMALS
}

fn default_enable_progress_bar() -> bool {
    true
}

impl PartdConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - `PARTD_ENCODINGS`: comma-separated encoding labels
    /// - `PARTD_DELIMITER`: single character
    /// - `PARTD_PLAN_DECIMALS`: number
    /// - `PARTD_NDC_DECIMALS`: number
    /// - `PARTD_SKIP_INVALID`: "true" or "false"
    /// - `PARTD_PROGRESS_BAR`: "true" or "false"
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PARTD_ENCODINGS") {
            let labels: Vec<String> = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !labels.is_empty() {
                config.encodings = labels;
            }
        }

        if let Ok(val) = std::env::var("PARTD_DELIMITER") {
            if let Some(c) = val.chars().next() {
                config.delimiter = c;
            }
        }

        if let Ok(val) = std::env::var("PARTD_PLAN_DECIMALS") {
            if let Ok(decimals) = val.parse() {
                config.plan_report_decimals = decimals;
            }
        }

        if let Ok(val) = std::env::var("PARTD_NDC_DECIMALS") {
            if let Ok(decimals) = val.parse() {
                config.ndc_report_decimals = decimals;
            }
        }

        if let Ok(val) = std::env::var("PARTD_SKIP_INVALID") {
            config.skip_invalid_records = val.to_lowercase() == "true";
        }

        if let Ok(val) = std::env::var("PARTD_PROGRESS_BAR") {
            config.enable_progress_bar = val.to_lowercase() == "true";
        }

        config
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| crate::PartdError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::PartdError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/partd/config.toml` on Unix-like systems
    /// or `%APPDATA%\partd\config.toml` on Windows
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "partd")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the default location, environment, or defaults
    ///
    /// Priority order:
    /// 1. Default config file (if exists)
    /// 2. Environment variables
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Some(config_path) = Self::default_config_path() {
            if config_path.exists() {
                if let Ok(config) = Self::from_file(&config_path) {
                    return config;
                }
            }
        }

        Self::from_env()
    }

    /// Build a snapshot reader from this configuration
    pub fn reader(&self) -> crate::Result<SnapshotReader> {
        let labels: Vec<&str> = self.encodings.iter().map(String::as_str).collect();
        if !self.delimiter.is_ascii() {
            return Err(crate::PartdError::Configuration {
                message: format!("Delimiter '{}' is not an ASCII character", self.delimiter),
                suggestion: Some("Use a single-byte delimiter such as '|' or ','".to_string()),
            });
        }

        let reader = SnapshotReader::new()
            .with_encodings(&labels)?
            .with_delimiter(self.delimiter as u8)
            .with_skip_invalid_records(self.skip_invalid_records);

        #[cfg(feature = "progress")]
        let reader = reader.with_progress_bar(self.enable_progress_bar);

        Ok(reader)
    }
}

// Global configuration support
use std::sync::RwLock;

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<Option<PartdConfig>> = RwLock::new(None);
}

/// Set the global configuration
pub fn set_global_config(config: PartdConfig) {
    *GLOBAL_CONFIG.write().unwrap() = Some(config);
}

/// Get the global configuration (or default if not set)
pub fn global_config() -> PartdConfig {
    GLOBAL_CONFIG.read().unwrap()
        .as_ref()
        .cloned()
        .unwrap_or_else(PartdConfig::load)
}

/// Clear the global configuration
pub fn clear_global_config() {
    *GLOBAL_CONFIG.write().unwrap() = None;
}

/// Builder for customizing configuration
pub struct ConfigBuilder {
    config: PartdConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self {
            config: PartdConfig::default(),
        }
    }

    /// Set the candidate encoding list
    pub fn encodings<S: Into<String>>(mut self, labels: Vec<S>) -> Self {
        self.config.encodings = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the field delimiter
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    /// Set rounding precision for plan-joined report metrics
    pub fn plan_report_decimals(mut self, decimals: u32) -> Self {
        self.config.plan_report_decimals = decimals;
        self
    }

    /// Set rounding precision for NDC-level report metrics
    pub fn ndc_report_decimals(mut self, decimals: u32) -> Self {
        self.config.ndc_report_decimals = decimals;
        self
    }

    /// Set skip invalid records
    pub fn skip_invalid_records(mut self, skip: bool) -> Self {
        self.config.skip_invalid_records = skip;
        self
    }

    /// Set progress bar enabled
    pub fn progress_bar(mut self, enabled: bool) -> Self {
        self.config.enable_progress_bar = enabled;
        self
    }

    /// Set the default export format
    pub fn default_export_format(mut self, format: crate::ExportFormat) -> Self {
        self.config.default_export_format = format;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PartdConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PartdConfig::default();
        assert_eq!(config.encodings, vec!["utf-8", "windows-1252"]);
        assert_eq!(config.delimiter, '|');
        assert_eq!(config.plan_report_decimals, 1);
        assert_eq!(config.ndc_report_decimals, 2);
        assert!(config.enable_progress_bar);
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .encodings(vec!["utf-8"])
            .delimiter(',')
            .plan_report_decimals(3)
            .skip_invalid_records(true)
            .progress_bar(false)
            .build();

        assert_eq!(config.encodings, vec!["utf-8"]);
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.plan_report_decimals, 3);
        assert!(config.skip_invalid_records);
        assert!(!config.enable_progress_bar);
    }

    #[test]
    fn test_reader_rejects_unknown_encoding() {
        let config = ConfigBuilder::new().encodings(vec!["not-a-charset"]).build();
        assert!(config.reader().is_err());
    }
}
