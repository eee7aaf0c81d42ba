use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{AppError, AppResult};

const MIB: u64 = 1024 * 1024;
/// Resumable segments must be a multiple of this size, except the last one.
pub const CHUNK_GRANULARITY: u64 = 256 * 1024;
/// Upper bound for waiting on video processing (one week).
pub const MAX_PROCESSING_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub publish_api_url: String,
    pub geocode_api_url: String,
    pub developer_key: Option<String>,
    pub request_timeout_secs: u64,
    pub upload: UploadConfig,
    pub processing: ProcessingConfig,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            publish_api_url: "https://streetviewpublish.googleapis.com".to_string(),
            geocode_api_url: "https://maps.googleapis.com".to_string(),
            developer_key: None,
            request_timeout_secs: 120,
            upload: UploadConfig::default(),
            processing: ProcessingConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub chunk_size_bytes: u64,
    /// Photos at or below this size go up in a single request.
    pub single_request_threshold_bytes: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: 20 * MIB,
            single_request_threshold_bytes: 20 * MIB,
            max_attempts: 4,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            exponential_base: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub poll_interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            timeout_secs: 3600,
        }
    }
}

impl ProcessingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub fn default_config_path() -> AppResult<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| AppError::Config("Could not find config directory".to_string()))?
        .join("streetview-uploader");
    Ok(config_dir.join("config.json"))
}

/// Load the configuration from the default location.
pub fn load_config() -> AppResult<Config> {
    load_config_from(&default_config_path()?)
}

/// Load and validate a config file. A missing file yields the defaults and
/// nothing is written back.
pub fn load_config_from(config_path: &Path) -> AppResult<Config> {
    if !config_path.exists() {
        log::debug!(
            "No config file at {}, using defaults",
            config_path.display()
        );
        return Ok(Config::default());
    }

    let config_str = fs::read_to_string(config_path)?;
    let config: Config = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        log::warn!("Failed to parse config file: {}. Using defaults.", e);
        Config::default()
    });

    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> AppResult<()> {
    for (field, url) in [
        ("publish_api_url", &config.publish_api_url),
        ("geocode_api_url", &config.geocode_api_url),
    ] {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(AppError::invalid_input(field, "Must be an http(s) URL"));
        }
    }

    let upload = &config.upload;
    if upload.chunk_size_bytes == 0 || upload.chunk_size_bytes % CHUNK_GRANULARITY != 0 {
        return Err(AppError::invalid_input(
            "upload.chunk_size_bytes",
            "Must be a non-zero multiple of 256 KiB",
        ));
    }

    if upload.max_attempts == 0 || upload.max_attempts > 10 {
        return Err(AppError::invalid_input(
            "upload.max_attempts",
            "Must be between 1 and 10",
        ));
    }

    if upload.exponential_base < 1.0 {
        return Err(AppError::invalid_input(
            "upload.exponential_base",
            "Must be at least 1.0",
        ));
    }

    if config.processing.poll_interval_secs == 0 {
        return Err(AppError::invalid_input(
            "processing.poll_interval_secs",
            "Must be greater than 0",
        ));
    }

    if config.processing.timeout_secs < config.processing.poll_interval_secs {
        return Err(AppError::invalid_input(
            "processing.timeout_secs",
            "Must be at least the poll interval",
        ));
    }

    if config.processing.timeout_secs > MAX_PROCESSING_TIMEOUT_SECS {
        return Err(AppError::invalid_input(
            "processing.timeout_secs",
            "Must be at most one week",
        ));
    }

    let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(AppError::invalid_input("log_level", "Must be a valid log level"));
    }

    Ok(())
}
