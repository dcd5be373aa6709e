//! Tree configuration
//!
//! A root device owns a [`DeviceConfig`]; every descendant shares it.

use serde::{Deserialize, Serialize};

/// How aggregation treats two children producing the same key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Fail the whole operation
    #[default]
    Reject,
    /// Later entry replaces the earlier one in place
    Overwrite,
}

/// Behavior shared by every device of a tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Unstage the already-staged part when `stage()` fails midway
    pub rollback_on_stage_failure: bool,
    /// Key collision handling in aggregations
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Joins a parent's name and an attribute into the child's name
    pub name_separator: String,
}

impl DeviceConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With rollback on stage failure
    #[inline]
    #[must_use]
    pub fn with_rollback(mut self, rollback: bool) -> Self {
        self.rollback_on_stage_failure = rollback;
        self
    }

    /// With duplicate key policy
    #[inline]
    #[must_use]
    pub fn with_duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_keys = policy;
        self
    }

    /// With name separator
    #[inline]
    #[must_use]
    pub fn with_name_separator(mut self, separator: impl Into<String>) -> Self {
        self.name_separator = separator.into();
        self
    }

    /// Parse from TOML
    ///
    /// Missing keys take their defaults.
    ///
    /// # Errors
    /// Returns error on malformed TOML, unknown keys or an empty separator
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Check constraints the type system cannot express
    ///
    /// # Errors
    /// Returns error if the name separator is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name_separator.is_empty() {
            return Err(ConfigError::EmptySeparator);
        }
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            rollback_on_stage_failure: true,
            duplicate_keys: DuplicateKeyPolicy::Reject,
            name_separator: "_".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed into a config
    #[error("invalid device configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Child names would be ambiguous
    #[error("name separator must not be empty")]
    EmptySeparator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DeviceConfig::new();
        assert!(config.rollback_on_stage_failure);
        assert_eq!(config.duplicate_keys, DuplicateKeyPolicy::Reject);
        assert_eq!(config.name_separator, "_");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods() {
        let config = DeviceConfig::new()
            .with_rollback(false)
            .with_duplicate_keys(DuplicateKeyPolicy::Overwrite)
            .with_name_separator("-");
        assert!(!config.rollback_on_stage_failure);
        assert_eq!(config.duplicate_keys, DuplicateKeyPolicy::Overwrite);
        assert_eq!(config.name_separator, "-");
    }

    #[test]
    fn from_toml_partial() {
        let config = DeviceConfig::from_toml_str("duplicate_keys = \"overwrite\"").unwrap();
        assert_eq!(config.duplicate_keys, DuplicateKeyPolicy::Overwrite);
        assert!(config.rollback_on_stage_failure);
    }

    #[test]
    fn from_toml_full() {
        let config = DeviceConfig::from_toml_str(
            r#"
            rollback_on_stage_failure = false
            duplicate_keys = "reject"
            name_separator = "__"
            "#,
        )
        .unwrap();
        assert!(!config.rollback_on_stage_failure);
        assert_eq!(config.name_separator, "__");
    }

    #[test]
    fn from_toml_rejects_unknown_key() {
        let result = DeviceConfig::from_toml_str("conf_suffix = \"_cfg\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn from_toml_rejects_empty_separator() {
        let result = DeviceConfig::from_toml_str("name_separator = \"\"");
        assert!(matches!(result, Err(ConfigError::EmptySeparator)));
    }
}
