//! Application configuration module
//!
//! Provides the validated configuration for the sync core, a builder for it,
//! and a TOML file format where every key is optional.
//!
//! ```rust
//! use dieselsync::shared::config::AppConfig;
//! use std::time::Duration;
//!
//! let config = AppConfig::builder()
//!     .endpoint_url("https://script.example.com/exec")
//!     .request_timeout(Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_retries, 5);
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Time-to-live per logical cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub machines: Duration,
    pub logs: Duration,
    pub inventory: Duration,
    pub alerts: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            machines: Duration::from_secs(24 * 60 * 60),
            logs: Duration::from_secs(60 * 60),
            inventory: Duration::from_secs(60 * 60),
            alerts: Duration::from_secs(30 * 60),
        }
    }
}

/// Delay policy between replay attempts of a queued mutation
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Every drain pass may retry the item
    Immediate,
    /// Fixed interval between retries
    Fixed {
        interval: Duration,
    },
    /// Exponential backoff with jitter
    Exponential {
        base: Duration,
        max: Duration,
        /// Jitter factor (0.0 to 1.0)
        jitter: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(2),
            max: Duration::from_secs(300),
            jitter: 0.1,
        }
    }
}

/// Validated sync-core configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Remote scripted endpoint (GET ?action=..., POST {action, ...})
    pub endpoint_url: String,
    /// Where the on-disk cache lives; `None` means the platform data dir
    pub data_dir: Option<PathBuf>,
    /// Deadline for every remote call
    pub request_timeout: Duration,
    /// Backend liveness probe period while internet is reachable
    pub probe_interval: Duration,
    /// Queue drain period while connected
    pub auto_sync_interval: Duration,
    /// Poll period of the degraded network observer
    pub network_poll_interval: Duration,
    /// Wait after reachability comes back before probing the backend
    pub reconnect_debounce: Duration,
    /// Pause between two replayed mutations
    pub drain_item_delay: Duration,
    /// Replay budget for non-destructive mutations
    pub max_retries: u32,
    /// Replay budget for machine deletions
    pub delete_max_retries: u32,
    /// Relative deviation from a machine's expected rate that raises an alert
    pub anomaly_tolerance: f64,
    pub cache_ttls: CacheTtls,
    pub backoff: BackoffStrategy,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.endpoint_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", self.endpoint_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                self.endpoint_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.probe_interval.is_zero() || self.auto_sync_interval.is_zero() || self.network_poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "intervals",
                reason: "periodic task intervals must be greater than zero".to_string(),
            });
        }
        if self.max_retries == 0 || self.delete_max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_retries",
                reason: "retry budgets must be at least 1".to_string(),
            });
        }
        if !self.anomaly_tolerance.is_finite() || self.anomaly_tolerance < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "anomaly_tolerance",
                reason: "must be a non-negative number".to_string(),
            });
        }
        if let BackoffStrategy::Exponential { jitter, .. } = self.backoff {
            if !(0.0..=1.0).contains(&jitter) {
                return Err(ConfigError::InvalidValue {
                    key: "backoff.jitter",
                    reason: "must be between 0.0 and 1.0".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Builder for AppConfig
#[derive(Debug)]
pub struct AppConfigBuilder {
    endpoint_url: Option<String>,
    data_dir: Option<PathBuf>,
    request_timeout: Duration,
    probe_interval: Duration,
    auto_sync_interval: Duration,
    network_poll_interval: Duration,
    reconnect_debounce: Duration,
    drain_item_delay: Duration,
    max_retries: u32,
    delete_max_retries: u32,
    anomaly_tolerance: f64,
    cache_ttls: CacheTtls,
    backoff: BackoffStrategy,
}

impl Default for AppConfigBuilder {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            data_dir: None,
            request_timeout: Duration::from_secs(10),
            probe_interval: Duration::from_secs(30),
            auto_sync_interval: Duration::from_secs(60),
            network_poll_interval: Duration::from_secs(5),
            reconnect_debounce: Duration::from_secs(2),
            drain_item_delay: Duration::from_millis(100),
            max_retries: 5,
            delete_max_retries: 3,
            anomaly_tolerance: 0.25,
            cache_ttls: CacheTtls::default(),
            backoff: BackoffStrategy::default(),
        }
    }
}

impl AppConfigBuilder {
    /// Set the remote endpoint URL
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn auto_sync_interval(mut self, interval: Duration) -> Self {
        self.auto_sync_interval = interval;
        self
    }

    pub fn network_poll_interval(mut self, interval: Duration) -> Self {
        self.network_poll_interval = interval;
        self
    }

    pub fn reconnect_debounce(mut self, delay: Duration) -> Self {
        self.reconnect_debounce = delay;
        self
    }

    pub fn drain_item_delay(mut self, delay: Duration) -> Self {
        self.drain_item_delay = delay;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn delete_max_retries(mut self, retries: u32) -> Self {
        self.delete_max_retries = retries;
        self
    }

    pub fn anomaly_tolerance(mut self, tolerance: f64) -> Self {
        self.anomaly_tolerance = tolerance;
        self
    }

    pub fn cache_ttls(mut self, ttls: CacheTtls) -> Self {
        self.cache_ttls = ttls;
        self
    }

    pub fn backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Overlay every key present in a parsed config file
    pub fn apply_file(mut self, file: FileConfig) -> Self {
        if let Some(url) = file.endpoint_url {
            self.endpoint_url = Some(url);
        }
        if let Some(dir) = file.data_dir {
            self.data_dir = Some(dir);
        }
        if let Some(ms) = file.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = file.probe_interval_secs {
            self.probe_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = file.auto_sync_interval_secs {
            self.auto_sync_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = file.network_poll_interval_secs {
            self.network_poll_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = file.reconnect_debounce_ms {
            self.reconnect_debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = file.drain_item_delay_ms {
            self.drain_item_delay = Duration::from_millis(ms);
        }
        if let Some(retries) = file.max_retries {
            self.max_retries = retries;
        }
        if let Some(retries) = file.delete_max_retries {
            self.delete_max_retries = retries;
        }
        if let Some(tolerance) = file.anomaly_tolerance {
            self.anomaly_tolerance = tolerance;
        }
        if let Some(ttl) = file.cache_ttl_secs {
            let ttls = &mut self.cache_ttls;
            if let Some(secs) = ttl.machines {
                ttls.machines = Duration::from_secs(secs);
            }
            if let Some(secs) = ttl.logs {
                ttls.logs = Duration::from_secs(secs);
            }
            if let Some(secs) = ttl.inventory {
                ttls.inventory = Duration::from_secs(secs);
            }
            if let Some(secs) = ttl.alerts {
                ttls.alerts = Duration::from_secs(secs);
            }
        }
        if let Some(backoff) = file.backoff {
            self.backoff = backoff.into();
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let endpoint_url = self
            .endpoint_url
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingValue("endpoint_url"))?;
        let config = AppConfig {
            endpoint_url,
            data_dir: self.data_dir,
            request_timeout: self.request_timeout,
            probe_interval: self.probe_interval,
            auto_sync_interval: self.auto_sync_interval,
            network_poll_interval: self.network_poll_interval,
            reconnect_debounce: self.reconnect_debounce,
            drain_item_delay: self.drain_item_delay,
            max_retries: self.max_retries,
            delete_max_retries: self.delete_max_retries,
            anomaly_tolerance: self.anomaly_tolerance,
            cache_ttls: self.cache_ttls,
            backoff: self.backoff,
        };
        config.validate()?;
        Ok(config)
    }
}

/// On-disk configuration; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub request_timeout_ms: Option<u64>,
    pub probe_interval_secs: Option<u64>,
    pub auto_sync_interval_secs: Option<u64>,
    pub network_poll_interval_secs: Option<u64>,
    pub reconnect_debounce_ms: Option<u64>,
    pub drain_item_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub delete_max_retries: Option<u32>,
    pub anomaly_tolerance: Option<f64>,
    pub cache_ttl_secs: Option<FileCacheTtls>,
    pub backoff: Option<FileBackoff>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileCacheTtls {
    pub machines: Option<u64>,
    pub logs: Option<u64>,
    pub inventory: Option<u64>,
    pub alerts: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case", deny_unknown_fields)]
pub enum FileBackoff {
    Immediate,
    Fixed { interval_ms: u64 },
    Exponential { base_ms: u64, max_ms: u64, jitter: Option<f64> },
}

impl From<FileBackoff> for BackoffStrategy {
    fn from(file: FileBackoff) -> Self {
        match file {
            FileBackoff::Immediate => BackoffStrategy::Immediate,
            FileBackoff::Fixed { interval_ms } => BackoffStrategy::Fixed {
                interval: Duration::from_millis(interval_ms),
            },
            FileBackoff::Exponential { base_ms, max_ms, jitter } => BackoffStrategy::Exponential {
                base: Duration::from_millis(base_ms),
                max: Duration::from_millis(max_ms),
                jitter: jitter.unwrap_or(0.1),
            },
        }
    }
}

impl FileConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error("config file could not be parsed: {0}")]
    Parse(String),
    #[error("config file could not be read: {0}")]
    Io(String),
}
