use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// Upper bound on per-kind event buffering.
pub const MAX_EVENT_CAPACITY: usize = 1 << 16;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Events buffered per kind for a subscriber that has not caught up.
    pub event_capacity: usize,
    /// Request activation as soon as the session is created.
    pub auto_activate: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { event_capacity: 64, auto_activate: false }
    }
}

impl SessionConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: "must be greater than zero".into(),
            });
        }
        if self.event_capacity > MAX_EVENT_CAPACITY {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: format!("must not exceed {MAX_EVENT_CAPACITY}"),
            });
        }
        Ok(())
    }
}
