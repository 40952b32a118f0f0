//! Sync configuration module
//!
//! Provides the configuration consumed by the store adapters and the
//! sync layer. Values are resolved from defaults, then an optional TOML
//! file, then environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default size of the realtime notification window
pub const DEFAULT_NOTIFICATION_WINDOW: usize = 50;

/// Products with fewer units than this are reported as low stock
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const MAX_NOTIFICATION_WINDOW: usize = 500;

/// Reconnection policy for the realtime listener after a subscription error
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    /// Stop the listener on the first error
    #[default]
    Never,
    /// Reopen the subscription with doubling delays
    Backoff {
        /// First delay in milliseconds
        initial_delay_ms: u64,
        /// Upper bound for a single delay in milliseconds
        max_delay_ms: u64,
        /// Attempts before giving up
        max_attempts: u32,
    },
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (0-based), or `None` once exhausted
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::Backoff {
                initial_delay_ms,
                max_delay_ms,
                max_attempts,
            } => {
                if attempt >= *max_attempts {
                    return None;
                }
                let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
                let delay = initial_delay_ms.saturating_mul(factor).min(*max_delay_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }
}

/// Configuration for the synchronization layer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the remote document store
    pub store_url: Option<String>,
    /// Bearer token forwarded to the remote store
    pub auth_token: Option<String>,
    /// Number of notifications kept in the realtime window
    pub notification_window: usize,
    /// Low stock threshold used by derived product reads
    pub low_stock_threshold: i64,
    /// Timeout for a single remote request
    pub request_timeout_secs: u64,
    /// Create the default categories for owners without any
    pub seed_default_categories: bool,
    /// Realtime listener reconnection policy
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_url: None,
            auth_token: None,
            notification_window: DEFAULT_NOTIFICATION_WINDOW,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            seed_default_categories: true,
            reconnect: ReconnectPolicy::Never,
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&source)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Load from the default path if it exists, otherwise defaults; env overrides apply either way
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                let mut config = Self::default();
                config.apply_env()?;
                Ok(config)
            }
        }
    }

    /// `<config dir>/inventory-sync/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("inventory-sync").join("config.toml"))
    }

    /// Override values from `INVENTORY_*` environment variables
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(url) = std::env::var("INVENTORY_STORE_URL") {
            self.store_url = Some(url);
        }
        if let Ok(token) = std::env::var("INVENTORY_AUTH_TOKEN") {
            self.auth_token = Some(token);
        }
        if let Ok(window) = std::env::var("INVENTORY_NOTIFICATION_WINDOW") {
            self.notification_window = window.trim().parse().map_err(|_| ConfigError::OutOfRange {
                field: "notification_window",
                message: format!("not a number: {}", window),
            })?;
        }
        if let Ok(threshold) = std::env::var("INVENTORY_LOW_STOCK_THRESHOLD") {
            self.low_stock_threshold = threshold.trim().parse().map_err(|_| ConfigError::OutOfRange {
                field: "low_stock_threshold",
                message: format!("not a number: {}", threshold),
            })?;
        }
        self.validate()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.store_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        if self.notification_window == 0 || self.notification_window > MAX_NOTIFICATION_WINDOW {
            return Err(ConfigError::OutOfRange {
                field: "notification_window",
                message: format!("must be within 1..={}", MAX_NOTIFICATION_WINDOW),
            });
        }
        if self.low_stock_threshold <= 0 {
            return Err(ConfigError::OutOfRange {
                field: "low_stock_threshold",
                message: "must be positive".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "request_timeout_secs",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Set the store URL
    pub fn store_url(mut self, url: impl Into<String>) -> Self {
        self.config.store_url = Some(url.into());
        self
    }

    /// Set the bearer token
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    pub fn notification_window(mut self, window: usize) -> Self {
        self.config.notification_window = window;
        self
    }

    pub fn low_stock_threshold(mut self, threshold: i64) -> Self {
        self.config.low_stock_threshold = threshold;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn seed_default_categories(mut self, seed: bool) -> Self {
        self.config.seed_default_categories = seed;
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.config.reconnect = policy;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    OutOfRange {
        field: &'static str,
        message: String,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("failed to read configuration: {0}")]
    Io(String),
}
