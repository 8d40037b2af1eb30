use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Case style applied to sanitized filename stems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStyle {
    /// Lowercase the whole stem
    Lower,
    /// Keep the stem as the model produced it
    Preserve,
}

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration for the rename/tag pipeline
///
/// A value of this type is passed explicitly into every component
/// constructor; there is no process-wide configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the local inference endpoint, e.g. "http://localhost:1234"
    pub endpoint_url: String,

    /// Model identifier sent with each request
    pub model: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum number of attempts against the endpoint (including the first)
    pub max_retries: u32,

    /// Base backoff delay in milliseconds; doubles per attempt for 5xx
    pub retry_base_delay_ms: u64,

    /// Fixed multiple of the base delay applied when rate-limited
    pub rate_limit_backoff_multiplier: u64,

    /// Sampling temperature for the model
    pub temperature: f32,

    /// Completion token cap for the model
    pub max_tokens: u32,

    /// Longest edge passed to the preprocessor before upload
    pub max_image_dimension: u32,

    /// Maximum number of tags kept from a model response
    pub max_tags: usize,

    /// Length cap for sanitized filename stems, in characters
    pub max_filename_len: usize,

    /// Case style applied to sanitized filename stems
    pub filename_case: CaseStyle,

    /// Whether to recurse into subdirectories when scanning
    pub recursive: bool,

    /// Whether to write metadata into files after a successful rename
    pub write_metadata: bool,

    /// Delay in milliseconds between a move and the metadata write,
    /// letting the OS release the file handle
    pub metadata_write_delay_ms: u64,

    /// Where session logs are stored; None uses the platform data dir
    pub session_dir: Option<PathBuf>,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint_url: "http://localhost:1234".to_string(),
            model: "qwen2-vl-7b-instruct".to_string(),
            request_timeout_secs: 120,
            max_retries: 3,
            retry_base_delay_ms: 500,
            rate_limit_backoff_multiplier: 8,
            temperature: 0.2,
            max_tokens: 512,
            max_image_dimension: 1024,
            max_tags: 10,
            max_filename_len: 64,
            filename_case: CaseStyle::Lower,
            recursive: false,
            write_metadata: true,
            metadata_write_delay_ms: 100,
            session_dir: None,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_url.trim().is_empty() {
            return Err(Error::Configuration(
                "Endpoint URL must not be empty".to_string(),
            ));
        }

        if self.max_retries == 0 {
            return Err(Error::Configuration(
                "Max retries must be at least 1".to_string(),
            ));
        }

        if self.max_filename_len < 8 {
            return Err(Error::Configuration(
                "Filename length cap must be at least 8 characters".to_string(),
            ));
        }

        if self.max_tags == 0 {
            return Err(Error::Configuration(
                "Tag cap must be at least 1".to_string(),
            ));
        }

        if self.max_image_dimension == 0 {
            return Err(Error::Configuration(
                "Image dimension cap must be at least 1 pixel".to_string(),
            ));
        }

        Ok(())
    }

    /// Directory where session logs are written
    pub fn session_log_dir(&self) -> PathBuf {
        match &self.session_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("image-renamer")
                .join("sessions"),
        }
    }
}
