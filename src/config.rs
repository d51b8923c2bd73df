//! Process-wide pool policy loaded at startup

use std::{env, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    allocators::MAX_MEGABYTES,
    error::{FramePoolError, Result},
};

/// Environment variable holding the global budget in megabytes
pub const ENV_MAX_MEMORY_MB: &str = "FRAMEPOOL_MAX_MEMORY_MB";
/// Environment variable toggling pool sharing between requests
pub const ENV_ENABLE_REUSE: &str = "FRAMEPOOL_ENABLE_REUSE";

/// Global budget and reuse policy
///
/// ```toml
/// max_total_memory_mb = 512
/// enable_reuse = true
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramePoolConfig {
    /// Byte ceiling across all pools in megabytes, 0 = unlimited
    pub max_total_memory_mb: usize,
    /// Share one pool per frame class
    pub enable_reuse: bool,
}

impl Default for FramePoolConfig {
    fn default() -> Self {
        Self {
            max_total_memory_mb: 0,
            enable_reuse: true,
        }
    }
}

impl FramePoolConfig {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject budgets that do not fit in the address space
    pub fn validate(&self) -> Result<()> {
        if self.max_total_memory_mb > MAX_MEGABYTES {
            return Err(FramePoolError::config(format!(
                "max_total_memory_mb {} exceeds the addressable maximum of {} MB",
                self.max_total_memory_mb, MAX_MEGABYTES
            )));
        }
        Ok(())
    }

    /// Load a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| FramePoolError::from_io(e, &format!("reading {}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Defaults overridden by `FRAMEPOOL_*` variables that are set
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from a variable lookup
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_MAX_MEMORY_MB) {
            self.max_total_memory_mb = value.trim().parse().map_err(|_| {
                FramePoolError::config(format!("{} must be a whole number, got '{}'", ENV_MAX_MEMORY_MB, value))
            })?;
        }

        if let Some(value) = lookup(ENV_ENABLE_REUSE) {
            self.enable_reuse = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(FramePoolError::config(format!(
                        "{} must be a boolean, got '{}'",
                        ENV_ENABLE_REUSE, value
                    )))
                }
            };
        }

        self.validate()?;
        Ok(self)
    }

    /// Serialize back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| FramePoolError::config(format!("TOML error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = FramePoolConfig::default();
        assert_eq!(config.max_total_memory_mb, 0);
        assert!(config.enable_reuse);
        assert_eq!(FramePoolConfig::from_toml_str("").unwrap(), config);
    }

    #[test]
    fn test_partial_toml() {
        let config = FramePoolConfig::from_toml_str("max_total_memory_mb = 64").unwrap();
        assert_eq!(config.max_total_memory_mb, 64);
        assert!(config.enable_reuse);

        let err = FramePoolConfig::from_toml_str("enable_reuse = \"maybe\"").unwrap_err();
        assert!(matches!(err, FramePoolError::Config { .. }));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [(ENV_MAX_MEMORY_MB, " 256 "), (ENV_ENABLE_REUSE, "off")].into();
        let config = FramePoolConfig::default()
            .with_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.max_total_memory_mb, 256);
        assert!(!config.enable_reuse);

        let err = FramePoolConfig::default()
            .with_overrides(|name| (name == ENV_MAX_MEMORY_MB).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_MEMORY_MB));
    }

    #[test]
    fn test_budget_beyond_address_space_rejected() {
        let huge = (MAX_MEGABYTES + 1).to_string();
        let err = FramePoolConfig::default()
            .with_overrides(|name| (name == ENV_MAX_MEMORY_MB).then(|| huge.clone()))
            .unwrap_err();
        assert!(matches!(err, FramePoolError::Config { .. }));

        let config = FramePoolConfig {
            max_total_memory_mb: MAX_MEGABYTES,
            enable_reuse: true,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = FramePoolConfig {
            max_total_memory_mb: 12,
            enable_reuse: false,
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(FramePoolConfig::from_toml_str(&text).unwrap(), config);
    }
}
