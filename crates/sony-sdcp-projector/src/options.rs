//! Integration options
//!
//! Defaults can come from a `sony_sdcp_projector:` section in YAML
//! configuration; per-entry options override them key by key.
//!
//! ```yaml
//! sony_sdcp_projector:
//!   settle_delay: 1.5
//!   max_workers: 2
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::constants::{DEFAULT_SETTLE_DELAY, DOMAIN};
use crate::executor::DEFAULT_MAX_WORKERS;

pub const CONF_SETTLE_DELAY: &str = "settle_delay";
pub const CONF_MAX_WORKERS: &str = "max_workers";

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("failed to parse YAML options: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse options: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid option value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Tunables for one projector entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdcpOptions {
    /// Seconds to wait before querying power
    pub settle_delay: f64,

    /// Concurrent blocking calls allowed against the projector
    pub max_workers: usize,
}

impl Default for SdcpOptions {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY.as_secs_f64(),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl SdcpOptions {
    /// Parse a bare options mapping.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, OptionsError> {
        let options = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        options.validate()?;
        Ok(options)
    }

    /// Pick the integration section out of a full YAML configuration.
    /// A missing or empty section yields the defaults.
    pub fn from_config(config: &serde_yaml::Value) -> Result<Self, OptionsError> {
        let options = match config.get(DOMAIN) {
            Some(serde_yaml::Value::Null) | None => Self::default(),
            Some(section) => serde_yaml::from_value(section.clone())?,
        };
        options.validate()?;
        Ok(options)
    }

    /// Overlay entry options on top of these values.
    pub fn merged_with(&self, overrides: &HashMap<String, Value>) -> Result<Self, OptionsError> {
        let mut merged = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        for (key, value) in overrides {
            merged.insert(key.clone(), value.clone());
        }

        let options: Self = serde_json::from_value(Value::Object(merged))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if Duration::try_from_secs_f64(self.settle_delay).is_err() {
            return Err(OptionsError::InvalidValue {
                key: CONF_SETTLE_DELAY,
                reason: format!(
                    "expected a non-negative number of seconds, got {}",
                    self.settle_delay
                ),
            });
        }
        if self.max_workers == 0 {
            return Err(OptionsError::InvalidValue {
                key: CONF_MAX_WORKERS,
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Out-of-range values fall back to the default delay.
    pub fn settle_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.settle_delay).unwrap_or(DEFAULT_SETTLE_DELAY)
    }
}
