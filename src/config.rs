//! Settings of a graph view.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::record::NodeId;

const DEFAULT_ROTATION_PERIOD_MS: u64 = 1500;
const DEFAULT_FLASH_PERIOD_MS: u64 = 600;

/// Configuration of a [`crate::GraphController`].
///
/// ```json
/// { "rootId": "deploy", "rotationPeriodMs": 1500, "flashPeriodMs": 600 }
/// ```
///
/// Only `rootId` is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Node the tree is rooted at.
    pub root_id: NodeId,

    /// One full turn of the running arcs.
    #[serde(default = "default_rotation_period_ms")]
    pub rotation_period_ms: u64,

    /// One opacity transition of a flashing node.
    #[serde(default = "default_flash_period_ms")]
    pub flash_period_ms: u64,
}

fn default_rotation_period_ms() -> u64 {
    DEFAULT_ROTATION_PERIOD_MS
}

fn default_flash_period_ms() -> u64 {
    DEFAULT_FLASH_PERIOD_MS
}

impl Config {
    pub fn new(root_id: impl Into<NodeId>) -> Self {
        Self {
            root_id: root_id.into(),
            rotation_period_ms: DEFAULT_ROTATION_PERIOD_MS,
            flash_period_ms: DEFAULT_FLASH_PERIOD_MS,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_rotation_period(mut self, period: Duration) -> Self {
        self.rotation_period_ms = period.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_flash_period(mut self, period: Duration) -> Self {
        self.flash_period_ms = period.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn rotation_period(&self) -> Duration {
        Duration::from_millis(self.rotation_period_ms)
    }

    pub fn flash_period(&self) -> Duration {
        Duration::from_millis(self.flash_period_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_id.is_empty() {
            return Err(ConfigError::Invalid("root id must not be empty"));
        }
        if self.rotation_period_ms == 0 {
            return Err(ConfigError::Invalid("rotation period must be non-zero"));
        }
        if self.flash_period_ms == 0 {
            return Err(ConfigError::Invalid("flash period must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_json(r#"{ "rootId": "deploy" }"#).unwrap();
        assert_eq!(config, Config::new("deploy"));
        assert_eq!(config.rotation_period(), Duration::from_millis(1500));
        assert_eq!(config.flash_period(), Duration::from_millis(600));
    }

    #[test]
    fn test_integer_root() {
        let config = Config::from_json(r#"{ "rootId": 42, "flashPeriodMs": 250 }"#).unwrap();
        assert_eq!(config.root_id.as_str(), "42");
        assert_eq!(config.flash_period_ms, 250);
    }

    #[test]
    fn test_builder() {
        let config = Config::new("a")
            .with_rotation_period(Duration::from_secs(2))
            .with_flash_period(Duration::from_millis(300));
        assert_eq!(config.rotation_period_ms, 2000);
        assert_eq!(config.flash_period_ms, 300);
    }

    #[test]
    fn test_missing_root() {
        let err = Config::from_json(r#"{ "flashPeriodMs": 250 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid() {
        let err = Config::from_json(r#"{ "rootId": "a", "rotationPeriodMs": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        assert!(Config::new("").validate().is_err());
        assert!(Config::new("a").with_flash_period(Duration::ZERO).validate().is_err());
        assert!(Config::new("a").validate().is_ok());
    }
}
