use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::errors::ConfigValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory for daily rolling log files, console only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Minimum log level
    pub level: String,

    /// Log format (pretty or json)
    pub format: String,

    /// Whether to include source code location in logs
    pub include_location: bool,

    /// Whether to include thread IDs in logs
    pub thread_ids: bool,

    /// Whether to include thread names in logs
    pub thread_names: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: None,
            level: "info".to_string(),
            format: "pretty".to_string(),
            include_location: false,
            thread_ids: false,
            thread_names: false,
        }
    }
}

impl Config {
    const LEVELS: [&'static str; 5] = ["error", "warn", "info", "debug", "trace"];
    const FORMATS: [&'static str; 2] = ["pretty", "json"];

    pub fn get_level_filter(&self) -> LevelFilter {
        match self.level.to_lowercase().as_str() {
            "error" => LevelFilter::ERROR,
            "warn" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => LevelFilter::INFO,
        }
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let level = self.level.to_lowercase();
        if !Self::LEVELS.contains(&level.as_str()) {
            return Err(ConfigValidationError::invalid(
                "logging.level",
                format!("'{}', expected one of {:?}", self.level, Self::LEVELS),
            ));
        }

        let format = self.format.to_lowercase();
        if !Self::FORMATS.contains(&format.as_str()) {
            return Err(ConfigValidationError::invalid(
                "logging.format",
                format!("'{}', expected one of {:?}", self.format, Self::FORMATS),
            ));
        }

        Ok(())
    }
}
