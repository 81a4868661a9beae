//! Configuration management for specmerge
//!
//! Configuration is loaded from `./config/specmerge.toml`, then a small set of
//! environment variables is applied on top. The template in `config/` is the
//! reference for every default.

use serde::Deserialize;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::image_selector::{DEFAULT_CACHE_TTL_MS, DEFAULT_PROBE_TIMEOUT_MS};

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/specmerge.toml";

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = include_str!("../config/specmerge.toml");

pub const ENV_CACHE_TTL_MS: &str = "IMAGE_SELECTOR_CACHE_TTL_MS";
pub const ENV_PREFER_OFFICIAL: &str = "PREFER_OFFICIAL_IMAGE";
pub const ENV_DEBUG_IMAGE_SELECTOR: &str = "DEBUG_IMAGE_SELECTOR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Invalid value '{value}' for environment variable {name} (expected {expected})")]
    InvalidEnv {
        name: String,
        value: String,
        expected: &'static str,
    },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    #[serde(default)]
    pub image_selector: ImageSelectorConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Image selection and probe cache settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ImageSelectorConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default)]
    pub prefer_official: bool,
    #[serde(default)]
    pub debug: bool,
}

fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

fn default_cache_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

impl Default for ImageSelectorConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            prefer_official: false,
            debug: false,
        }
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_concurrency")]
    pub concurrency: usize,
}

fn default_batch_concurrency() -> usize {
    8
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_batch_concurrency(),
        }
    }
}

/// Upload row settings
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_status")]
    pub default_status: String,
}

fn default_status() -> String {
    "draft".to_string()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            default_status: default_status(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path, then apply environment overrides
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the embedded template. Used when no config file is required.
    pub fn default_config() -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(DEFAULT_CONFIG)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the recognized environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_CACHE_TTL_MS) {
            self.image_selector.cache_ttl_ms = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_CACHE_TTL_MS.to_string(),
                value: value.clone(),
                expected: "a non-negative integer of milliseconds",
            })?;
        }
        if let Some(value) = lookup(ENV_PREFER_OFFICIAL) {
            self.image_selector.prefer_official = parse_env_bool(ENV_PREFER_OFFICIAL, &value)?;
        }
        if let Some(value) = lookup(ENV_DEBUG_IMAGE_SELECTOR) {
            self.image_selector.debug = parse_env_bool(ENV_DEBUG_IMAGE_SELECTOR, &value)?;
        }
        Ok(())
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.user_agent.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "http.user_agent".to_string(),
            });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }
        if self.image_selector.probe_timeout_ms == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "image_selector.probe_timeout_ms".to_string(),
            });
        }
        if self.batch.concurrency == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "batch.concurrency".to_string(),
            });
        }
        if self.upload.default_status.trim().is_empty() {
            return Err(ConfigError::EmptyRequired {
                field: "upload.default_status".to_string(),
            });
        }
        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        Self::create_default_config_at(Path::new(CONFIG_PATH))
    }

    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }

    /// Check if stdin is a TTY (interactive terminal)
    pub fn is_interactive() -> bool {
        io::stdin().is_terminal()
    }

    /// Prompt user to create default config (only in interactive mode)
    pub fn prompt_create_config() -> Result<Option<PathBuf>, ConfigError> {
        if !Self::is_interactive() {
            return Ok(None);
        }

        print!("Configuration file not found. Create default config? [Y/n] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_lowercase();

        if input.is_empty() || input == "y" || input == "yes" {
            let path = Self::create_default_config()?;
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

fn parse_env_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: value.to_string(),
            expected: "a boolean (1/0, true/false, yes/no, on/off)",
        }),
    }
}
