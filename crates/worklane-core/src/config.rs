//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default identity API URL (can be overridden at compile time via WORKLANE_API_URL).
pub const DEFAULT_API_URL: &str = match option_env!("WORKLANE_API_URL") {
    Some(url) => url,
    None => "https://api.worklane.app",
};

/// Default web app URL (can be overridden at compile time via WORKLANE_WEB_APP_URL).
pub const DEFAULT_WEB_APP_URL: &str = match option_env!("WORKLANE_WEB_APP_URL") {
    Some(url) => url,
    None => "https://worklane.app",
};

/// Default publishable client key (public, safe to expose; overridable at
/// compile time via WORKLANE_CLIENT_KEY).
pub const DEFAULT_CLIENT_KEY: &str = match option_env!("WORKLANE_CLIENT_KEY") {
    Some(key) => key,
    None => "wl_pk_public",
};

/// Default log level.
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default interval between background user refreshes, in seconds.
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 45;

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Identity API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Web application base URL (OAuth provider pages live here).
    #[serde(default = "default_web_app_url")]
    pub web_app_url: String,
    /// Publishable client key sent with every identity API call.
    #[serde(default = "default_client_key")]
    pub client_key: String,
    /// Interval between background user refreshes, in seconds.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

fn default_client_key() -> String {
    DEFAULT_CLIENT_KEY.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_web_app_url() -> String {
    DEFAULT_WEB_APP_URL.to_string()
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            web_app_url: DEFAULT_WEB_APP_URL.to_string(),
            client_key: DEFAULT_CLIENT_KEY.to_string(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("WORKLANE_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(api_url) = std::env::var("WORKLANE_API_URL_OVERRIDE") {
            if !api_url.trim().is_empty() {
                self.api_url = api_url;
            }
        }
    }

    /// Get the identity API URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_url).map_err(CoreError::from)
    }

    /// Get the web app URL as a parsed URL.
    pub fn web_app_url(&self) -> CoreResult<Url> {
        Url::parse(&self.web_app_url).map_err(CoreError::from)
    }
}
