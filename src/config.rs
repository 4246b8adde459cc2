//! Bridge configuration
//!
//! Limits for the callback registry and dispatch queue, plus the name the
//! device advertises. Stored as JSON; every field has a default.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest name that fits the scan response of a legacy advertisement.
pub const MAX_DEVICE_NAME_LEN: usize = 29;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Longest accepted event type label, in bytes.
    pub max_event_type_len: usize,

    /// Number of callback slots in the registry arena.
    pub registry_capacity: usize,

    /// Number of dispatches that may wait for the script task.
    pub queue_capacity: usize,

    /// Complete local name sent in the scan response.
    pub device_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            // 20-byte label buffer including the terminator
            max_event_type_len: 19,
            registry_capacity: 16,
            queue_capacity: 32,
            device_name: "Arduino101".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::debug!("Loaded bridge config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_event_type_len == 0 {
            return Err(ConfigError::Invalid(
                "max_event_type_len must be at least 1".into(),
            ));
        }
        if self.registry_capacity == 0 {
            return Err(ConfigError::Invalid(
                "registry_capacity must be at least 1".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.device_name.is_empty() || self.device_name.len() > MAX_DEVICE_NAME_LEN {
            return Err(ConfigError::Invalid(format!(
                "device_name must be 1..={} bytes, got {}",
                MAX_DEVICE_NAME_LEN,
                self.device_name.len()
            )));
        }
        Ok(())
    }
}
