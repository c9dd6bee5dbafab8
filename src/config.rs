//! Configuration management for lv-capture.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values
//!
//! The resulting [`Config`] is handed to the writer and the capture loop
//! explicitly; nothing else in the library consults the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Args;

/// Default path of the control FIFO written by the shell integration.
pub const DEFAULT_CONTROL_PATH: &str = "/tmp/cmd_control";

/// Default number of bytes read from the data stream per ready event.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default upper bound on a single multiplexer wait.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 100;

/// Default maximum length, in characters, of the terminal preview.
pub const DEFAULT_PREVIEW_WIDTH: usize = 200;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture pipeline configuration.
    pub capture: CaptureSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Capture pipeline configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    /// Persistent log file receiving every record in full.
    pub log_file: Option<PathBuf>,
    /// Control channel (named pipe) carrying command boundaries.
    pub control_path: PathBuf,
    /// Bytes read from the data stream per ready event.
    pub chunk_size: usize,
    /// Multiplexer wait bound in milliseconds.
    pub poll_timeout_ms: u64,
    /// Terminal preview width in characters.
    pub preview_width: usize,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            log_file: None,
            control_path: PathBuf::from(DEFAULT_CONTROL_PATH),
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            preview_width: DEFAULT_PREVIEW_WIDTH,
        }
    }
}

impl CaptureSection {
    /// Multiplexer wait bound as a `Duration`.
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    ///
    /// Numeric variables that fail to parse are ignored.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup (for testing).
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("LV_LOG_FILE").filter(|p| !p.is_empty()) {
            self.capture.log_file = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("LV_CONTROL_PATH").filter(|p| !p.is_empty()) {
            self.capture.control_path = PathBuf::from(path);
        }

        if let Some(size) = lookup("LV_CHUNK_SIZE").and_then(|v| v.parse().ok()) {
            self.capture.chunk_size = size;
        }

        if let Some(ms) = lookup("LV_POLL_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.capture.poll_timeout_ms = ms;
        }

        if let Some(width) = lookup("LV_PREVIEW_WIDTH").and_then(|v| v.parse().ok()) {
            self.capture.preview_width = width;
        }

        if let Some(level) = lookup("LV_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref path) = args.log_file {
            self.capture.log_file = Some(path.clone());
        }

        if let Some(ref path) = args.control {
            self.capture.control_path = path.clone();
        }

        if let Some(size) = args.chunk_size {
            self.capture.chunk_size = size;
        }

        if let Some(width) = args.preview_width {
            self.capture.preview_width = width;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Reject values the capture pipeline cannot operate with.
    ///
    /// A missing log file is not rejected here; it surfaces at the first write.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("chunk_size", "0".into()));
        }
        if self.capture.poll_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("poll_timeout_ms", "0".into()));
        }
        if self.capture.preview_width < 3 {
            return Err(ConfigError::InvalidValue(
                "preview_width",
                self.capture.preview_width.to_string(),
            ));
        }
        Ok(())
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> String {
        let level = self.logging.level.as_str();
        if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            format!("lv_capture={level}")
        }
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("failed to read config file: {0}")]
    Io(#[source] std::io::Error),
    /// JSON parsing error.
    #[error("failed to parse config file: {0}")]
    Json(#[source] serde_json::Error),
    /// A setting holds a value the pipeline cannot use.
    #[error("invalid value for {0}: '{1}'")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.capture.log_file.is_none());
        assert_eq!(config.capture.control_path, PathBuf::from("/tmp/cmd_control"));
        assert_eq!(config.capture.chunk_size, 1024);
        assert_eq!(config.capture.poll_timeout(), Duration::from_millis(100));
        assert_eq!(config.capture.preview_width, 200);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "capture": {
                "log_file": "/var/log/commands.log",
                "control_path": "/run/user/1000/lv_control",
                "preview_width": 80
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(
            config.capture.log_file,
            Some(PathBuf::from("/var/log/commands.log"))
        );
        assert_eq!(
            config.capture.control_path,
            PathBuf::from("/run/user/1000/lv_control")
        );
        assert_eq!(config.capture.preview_width, 80);
        assert_eq!(config.capture.chunk_size, 1024); // Default
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_apply_env() {
        let mut config = Config::default();
        config.apply_env_from(env(&[
            ("LV_LOG_FILE", "/tmp/out.log"),
            ("LV_CONTROL_PATH", "/tmp/ctl"),
            ("LV_CHUNK_SIZE", "4096"),
            ("LV_POLL_TIMEOUT_MS", "250"),
            ("LV_PREVIEW_WIDTH", "120"),
            ("LV_LOG_LEVEL", "debug"),
        ]));

        assert_eq!(config.capture.log_file, Some(PathBuf::from("/tmp/out.log")));
        assert_eq!(config.capture.control_path, PathBuf::from("/tmp/ctl"));
        assert_eq!(config.capture.chunk_size, 4096);
        assert_eq!(config.capture.poll_timeout_ms, 250);
        assert_eq!(config.capture.preview_width, 120);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_apply_env_ignores_garbage_numbers() {
        let mut config = Config::default();
        config.apply_env_from(env(&[("LV_CHUNK_SIZE", "lots"), ("LV_LOG_FILE", "")]));

        assert_eq!(config.capture.chunk_size, 1024);
        assert!(config.capture.log_file.is_none());
    }

    #[test]
    fn test_rust_log_fallback() {
        let mut config = Config::default();
        config.apply_env_from(env(&[("RUST_LOG", "trace")]));
        assert_eq!(config.logging.level, "trace");

        let mut config = Config::default();
        config.apply_env_from(env(&[("RUST_LOG", "trace"), ("LV_LOG_LEVEL", "info")]));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        config.apply_env_from(env(&[("LV_LOG_FILE", "/tmp/env.log")]));

        let args = Args {
            log_file: Some(PathBuf::from("/tmp/cli.log")),
            control: Some(PathBuf::from("/tmp/cli_control")),
            chunk_size: Some(512),
            ..Args::default()
        };
        config.apply_args(&args);

        assert_eq!(config.capture.log_file, Some(PathBuf::from("/tmp/cli.log")));
        assert_eq!(config.capture.control_path, PathBuf::from("/tmp/cli_control"));
        assert_eq!(config.capture.chunk_size, 512);
        assert_eq!(config.capture.preview_width, 200);
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let mut config = Config::default();
        config.capture.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("chunk_size", _))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_poll_timeout() {
        let mut config = Config::default();
        config.capture.poll_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue("poll_timeout_ms", _))
        ));

        config.capture.poll_timeout_ms = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_narrow_preview() {
        let mut config = Config::default();
        config.capture.preview_width = 2;
        assert!(config.validate().is_err());

        config.capture.preview_width = 3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_filter() {
        let mut config = Config::default();
        assert_eq!(config.log_filter(), "lv_capture=warn");

        config.logging.level = "lv_capture=trace,info".to_string();
        assert_eq!(config.log_filter(), "lv_capture=trace,info");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"control_path\""));
        assert!(json.contains("\"preview_width\""));
    }
}
