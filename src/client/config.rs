use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError, FileConfig};
use std::path::{Path, PathBuf};

/// Endpoint used when nothing else is configured
const DEFAULT_ENDPOINT_URL: &str = "http://127.0.0.1:8080/exec";

/// Path to an optional TOML config file
pub const CONFIG_FILE_ENV: &str = "DIESEL_CONFIG";
pub const ENDPOINT_ENV: &str = "DIESEL_API_URL";
pub const DATA_DIR_ENV: &str = "DIESEL_DATA_DIR";

const CACHE_FILE: &str = "cache.db";
const APP_DIR: &str = "dieselsync";

/// Client configuration wrapper.
///
/// Precedence, lowest first: built-in defaults, the TOML file named by
/// `DIESEL_CONFIG`, then `DIESEL_API_URL` and `DIESEL_DATA_DIR`.
#[derive(Debug, Clone)]
pub struct Config {
    app: AppConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = AppConfig::builder().endpoint_url(DEFAULT_ENDPOINT_URL);

        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            tracing::debug!(path = %path, "loading config file");
            builder = builder.apply_file(FileConfig::load(Path::new(&path))?);
        }
        if let Ok(url) = std::env::var(ENDPOINT_ENV) {
            builder = builder.endpoint_url(url);
        }
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            builder = builder.data_dir(dir);
        }

        Self::with_builder(builder)
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self { app: builder.build()? })
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn endpoint_url(&self) -> &str {
        &self.app.endpoint_url
    }

    /// The configured data dir, else the platform data dir
    pub fn data_dir(&self) -> PathBuf {
        match &self.app.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR),
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir().join(CACHE_FILE)
    }
}

impl From<AppConfig> for Config {
    fn from(app: AppConfig) -> Self {
        Self { app }
    }
}
