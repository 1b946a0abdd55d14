//! Configuration loading and value resolution
//!
//! Bootstrap configuration is a small TOML file. Every value can be
//! overridden, resolved in this order:
//! 1. Explicit value passed by the caller (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Built-in default (fallback)
//!
//! A missing config file is not an error: a warning is logged and the
//! built-in defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the backend base URL
pub const ENV_API_BASE_URL: &str = "INSP_API_BASE_URL";

/// Environment variable carrying the bearer token
pub const ENV_API_TOKEN: &str = "INSP_API_TOKEN";

/// Default backend base URL (local development server)
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Default per-request budget in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 25;

/// Default number of concurrent detail fetches during hydration
pub const DEFAULT_HYDRATION_CONCURRENCY: usize = 6;

/// Default cap on followed `next` links for one listing
pub const DEFAULT_MAX_LIST_PAGES: usize = 50;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Backend base URL, e.g. `https://portal.example/api`
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Bearer token. Prefer the environment variable over storing it here.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Concurrent detail fetches while hydrating actors (floor 2)
    #[serde(default = "default_hydration_concurrency")]
    pub hydration_concurrency: usize,

    /// Maximum number of listing pages followed through `next` links
    #[serde(default = "default_max_list_pages")]
    pub max_list_pages: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit ANSI colours
    #[serde(default)]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: false,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            hydration_concurrency: default_hydration_concurrency(),
            max_list_pages: default_max_list_pages(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_hydration_concurrency() -> usize {
    DEFAULT_HYDRATION_CONCURRENCY
}

fn default_max_list_pages() -> usize {
    DEFAULT_MAX_LIST_PAGES
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns error if the file can not be read, is not valid TOML or
    /// carries invalid values.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration, falling back to defaults when the file is missing
    ///
    /// A present but malformed file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                path = %path.display(),
                "Config file not found, using built-in defaults"
            );
            return Ok(Self::default());
        }

        let config = Self::load(path)?;
        info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_list_pages == 0 {
            return Err(Error::Config(
                "max_list_pages must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default config file path for the platform
///
/// `~/.config/insp/config.toml` on Linux, the platform config dir elsewhere.
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("insp").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
}

/// Resolve the backend base URL
///
/// **Priority:** explicit → ENV → TOML → built-in default.
/// A trailing slash is stripped so paths can be appended uniformly.
pub fn resolve_api_base_url(explicit: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    let env_value = std::env::var(ENV_API_BASE_URL).ok();

    let (url, source) = if let Some(url) = non_empty(explicit) {
        (url.to_string(), "caller")
    } else if let Some(url) = non_empty(env_value.as_deref()) {
        (url.to_string(), "environment")
    } else if let Some(url) = non_empty(toml_config.api_base_url.as_deref()) {
        (url.to_string(), "TOML")
    } else {
        (DEFAULT_API_BASE_URL.to_string(), "default")
    };

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(Error::Config(format!(
            "API base URL from {} must start with http:// or https://: {}",
            source, url
        )));
    }

    info!(source, url = %url, "Resolved API base URL");
    Ok(url.trim_end_matches('/').to_string())
}

/// Resolve the bearer token
///
/// **Priority:** ENV → TOML. No token is a valid outcome: requests then rely
/// on the session cookie alone.
pub fn resolve_api_token(toml_config: &TomlConfig) -> Option<String> {
    let env_token = std::env::var(ENV_API_TOKEN).ok();
    let env_token = non_empty(env_token.as_deref()).map(str::to_string);
    let toml_token = non_empty(toml_config.api_token.as_deref()).map(str::to_string);

    if env_token.is_some() && toml_token.is_some() {
        warn!("API token found in environment and TOML. Using environment (highest priority).");
    }

    match (env_token, toml_token) {
        (Some(token), _) => {
            info!("API token loaded from environment variable");
            Some(token)
        }
        (None, Some(token)) => {
            info!("API token loaded from TOML config");
            Some(token)
        }
        (None, None) => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
