//! Application settings loaded from config.toml
//!
//! Every section is optional; missing values fall back to defaults so an empty
//! file (or no file at all) yields a working configuration. The `[[variant_types]]`
//! entries seed the variant catalog at startup.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Database connection settings
    pub database: DatabaseSettings,
    /// Checkout retry policy
    pub checkout: CheckoutSettings,
    /// Cart limits
    pub cart: CartSettings,
    /// Stock hint cache
    pub cache: CacheSettings,
    /// Variant types to seed
    pub variant_types: Vec<VariantTypeConfig>,
}

/// `[database]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL; `DATABASE_URL` takes precedence
    pub url: Option<String>,
}

/// `[checkout]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckoutSettings {
    /// Extra attempts after an aborted transaction
    pub max_retries: u32,
    /// Backoff before the first retry, doubled on each further retry
    pub retry_backoff_ms: u64,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 50,
        }
    }
}

impl CheckoutSettings {
    /// Backoff before the first retry.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// `[cart]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CartSettings {
    /// Upper bound for a single line's quantity
    pub max_quantity_per_line: i32,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            max_quantity_per_line: 9999,
        }
    }
}

/// `[cache]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Use the in-memory stock hint cache
    pub enabled: bool,
    /// Lifetime of a cached stock hint
    pub stock_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            stock_ttl_secs: 30,
        }
    }
}

impl CacheSettings {
    /// Lifetime of a cached stock hint.
    #[must_use]
    pub const fn stock_ttl(&self) -> Duration {
        Duration::from_secs(self.stock_ttl_secs)
    }
}

/// Configuration for a single variant type to seed
#[derive(Debug, Deserialize, Clone)]
pub struct VariantTypeConfig {
    /// Machine name, stored lowercase
    pub name: String,
    /// Label shown to buyers
    pub display_name: String,
    /// Position of the axis in combination names
    #[serde(default)]
    pub sort_order: i32,
}

/// Parses settings from TOML text.
///
/// # Errors
/// Returns `Error::Config` if the TOML syntax is invalid or a field has the wrong type.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_settings(&contents)
}

/// Loads settings from the default location (./config.toml), or defaults if the file is absent.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_default_settings() -> Result<Settings> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_settings(path)
    } else {
        tracing::warn!("config.toml not found, using default settings");
        Ok(Settings::default())
    }
}
