//! Configuration for a camera conversation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Camera/session configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Restrict discovery to this vendor id.
    pub vendor_id: Option<u16>,
    /// Restrict discovery to this product id.
    pub product_id: Option<u16>,
    /// Bulk transfer timeout in milliseconds.
    pub transfer_timeout_ms: u64,
    /// How long to wait for an interrupt event before giving up.
    pub event_timeout_ms: u64,
    /// Maximum bytes accepted in one bulk read.
    pub max_bulk_read: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            vendor_id: None,
            product_id: None,
            transfer_timeout_ms: 5_000,
            event_timeout_ms: 10_000,
            max_bulk_read: 10 * 1024 * 1024,
        }
    }
}

impl CameraConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }

    pub fn event_timeout(&self) -> Duration {
        Duration::from_millis(self.event_timeout_ms)
    }
}
