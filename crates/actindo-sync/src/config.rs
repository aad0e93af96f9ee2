//! # Connector Configuration
//!
//! Configuration management for the connector.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     ACTINDO_CHUNK_SIZE=200                                              │
//! │     ACTINDO_ORDER_PAGE_SIZE=100                                         │
//! │     ACTINDO_LOG=actindo_sync=debug                                      │
//! │     ACTINDO_SHOP_VERSION=5.7.18                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/actindo-connector/connector.toml (Linux)                  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [shop]
//! type = "shopware"
//! version = "5.7.18"
//!
//! [batch]
//! chunk_size = 100
//!
//! [orders]
//! page_size = 50
//!
//! [tax]
//! reduced_key = "2"
//! reduced_tax_id = 4
//! standard_tax_id = 1
//!
//! [logging]
//! filter = "info"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    #[error("Failed to save config: {0}")]
    SaveFailed(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// What the connector reports about the storefront it runs in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopSettings {
    #[serde(rename = "type", default = "default_shop_type")]
    pub kind: String,

    #[serde(default = "default_shop_version")]
    pub version: String,
}

fn default_shop_type() -> String {
    "shopware".to_string()
}

fn default_shop_version() -> String {
    "5".to_string()
}

impl Default for ShopSettings {
    fn default() -> Self {
        ShopSettings {
            kind: default_shop_type(),
            version: default_shop_version(),
        }
    }
}

/// Bulk write behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSettings {
    /// Writes issued between two gateway flushes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    100
}

impl Default for BatchSettings {
    fn default() -> Self {
        BatchSettings {
            chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettings {
    /// Orders per `orders.list` page when the hub sends no limit.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    50
}

impl Default for OrderSettings {
    fn default() -> Self {
        OrderSettings {
            page_size: default_page_size(),
        }
    }
}

/// Hub tax keys → storefront tax ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSettings {
    #[serde(default = "default_reduced_key")]
    pub reduced_key: String,

    #[serde(default = "default_reduced_tax_id")]
    pub reduced_tax_id: i64,

    #[serde(default = "default_standard_tax_id")]
    pub standard_tax_id: i64,
}

fn default_reduced_key() -> String {
    "2".to_string()
}

fn default_reduced_tax_id() -> i64 {
    4
}

fn default_standard_tax_id() -> i64 {
    1
}

impl Default for TaxSettings {
    fn default() -> Self {
        TaxSettings {
            reduced_key: default_reduced_key(),
            reduced_tax_id: default_reduced_tax_id(),
            standard_tax_id: default_standard_tax_id(),
        }
    }
}

impl TaxSettings {
    /// Storefront tax id for a hub tax key.
    pub fn tax_id(&self, key: &str) -> i64 {
        if key.trim() == self.reduced_key {
            self.reduced_tax_id
        } else {
            self.standard_tax_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete connector configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default)]
    pub shop: ShopSettings,

    #[serde(default)]
    pub batch: BatchSettings,

    #[serde(default)]
    pub orders: OrderSettings,

    #[serde(default)]
    pub tax: TaxSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl ConnectorConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (connector.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading connector config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load connector config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::SaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Connector config saved");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "batch.chunk_size must be greater than 0".into(),
            ));
        }
        if self.orders.page_size == 0 {
            return Err(ConfigError::Invalid(
                "orders.page_size must be greater than 0".into(),
            ));
        }
        if self.tax.reduced_tax_id < 1 || self.tax.standard_tax_id < 1 {
            return Err(ConfigError::Invalid("tax ids must be positive".into()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var("ACTINDO_CHUNK_SIZE") {
            match size.parse::<usize>() {
                Ok(n) => {
                    debug!(chunk_size = n, "Overriding chunk size from environment");
                    self.batch.chunk_size = n;
                }
                Err(_) => warn!(value = %size, "Ignoring invalid ACTINDO_CHUNK_SIZE"),
            }
        }

        if let Ok(size) = std::env::var("ACTINDO_ORDER_PAGE_SIZE") {
            match size.parse::<usize>() {
                Ok(n) => self.orders.page_size = n,
                Err(_) => warn!(value = %size, "Ignoring invalid ACTINDO_ORDER_PAGE_SIZE"),
            }
        }

        if let Ok(filter) = std::env::var("ACTINDO_LOG") {
            self.logging.filter = filter;
        }

        if let Ok(version) = std::env::var("ACTINDO_SHOP_VERSION") {
            debug!(version = %version, "Overriding shop version from environment");
            self.shop.version = version;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "actindo", "connector")
            .map(|dirs| dirs.config_dir().join("connector.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectorConfig::default();
        assert_eq!(config.batch.chunk_size, 100);
        assert_eq!(config.orders.page_size, 50);
        assert_eq!(config.shop.kind, "shopware");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let config: ConnectorConfig = toml::from_str(
            r#"
            [batch]
            chunk_size = 25

            [tax]
            reduced_tax_id = 9
            "#,
        )
        .unwrap();
        assert_eq!(config.batch.chunk_size, 25);
        assert_eq!(config.tax.reduced_tax_id, 9);
        assert_eq!(config.tax.standard_tax_id, 1);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_config_validation() {
        let mut config = ConnectorConfig::default();
        config.batch.chunk_size = 0;
        assert!(config.validate().is_err());

        config.batch.chunk_size = 1;
        config.tax.standard_tax_id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tax_key_mapping() {
        let tax = TaxSettings::default();
        assert_eq!(tax.tax_id("2"), 4);
        assert_eq!(tax.tax_id(" 2 "), 4);
        assert_eq!(tax.tax_id("1"), 1);
        assert_eq!(tax.tax_id(""), 1);
    }

    #[test]
    fn test_toml_serialization() {
        let toml_str = toml::to_string_pretty(&ConnectorConfig::default()).unwrap();
        assert!(toml_str.contains("[shop]"));
        assert!(toml_str.contains("[batch]"));
        assert!(toml_str.contains("type = \"shopware\""));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("actindo-config-{}", std::process::id()));
        let path = dir.join("connector.toml");

        let mut config = ConnectorConfig::default();
        config.orders.page_size = 75;
        config.save(Some(path.clone())).unwrap();

        let loaded = ConnectorConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.orders.page_size, 75);
        let _ = std::fs::remove_dir_all(dir);
    }
}
