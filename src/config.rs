//! Client configuration.
//!
//! Loaded from TOML. Search order:
//! 1. An explicit path (CLI `--config`)
//! 2. `labstock.toml` next to the executable
//! 3. The default embedded in the binary
//!
//! `LABSTOCK_API_URL` overrides the backend URL whichever file was used.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::api::normalize_base_url;
use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "labstock.toml";
pub const API_URL_ENV: &str = "LABSTOCK_API_URL";

const DEFAULT_CONFIG: &str = r#"
[api]
base_url = "https://universidad-la9h.onrender.com"
timeout_secs = 30
page_size = 10

[logging]
filter = "info,lab_supplies_lib=debug"
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Log directory; the platform data dir when unset.
    pub dir: Option<PathBuf>,
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    crate::models::DEFAULT_PAGE_SIZE
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl AppConfig {
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn embedded_default() -> Result<Self, ConfigError> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Load following the search order above.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => {
                info!("Loading config from: {}", path.display());
                Self::from_toml(&std::fs::read_to_string(path)?)?
            }
            None => match exe_dir_config() {
                Some(path) => {
                    info!("Loading config from: {}", path.display());
                    Self::from_toml(&std::fs::read_to_string(&path)?)?
                }
                None => {
                    info!("Using default embedded configuration");
                    Self::embedded_default()?
                }
            },
        };

        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.apply_url_override(&url)?;
        }
        Ok(config)
    }

    fn apply_url_override(&mut self, url: &str) -> Result<(), ConfigError> {
        if url.trim().is_empty() {
            warn!("{API_URL_ENV} is set but empty, ignoring");
            return Ok(());
        }
        self.api.base_url = url.to_string();
        self.validate()
    }

    fn validate(&mut self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url is empty".into()));
        }
        self.api.base_url = normalize_base_url(&self.api.base_url);
        if self.api.page_size == 0 {
            return Err(ConfigError::Invalid("api.page_size must be at least 1".into()));
        }
        Ok(())
    }
}

fn exe_dir_config() -> Option<PathBuf> {
    let exe_path = std::env::current_exe().ok()?;
    let path = exe_path.parent()?.join(CONFIG_FILE_NAME);
    if path.exists() {
        Some(path)
    } else {
        None
    }
}
