// src/config.rs

//! Configuration file handling
//!
//! The configuration file is optional; every key has a default.
//!
//! ```toml
//! product_dir = "/etc/pki/product"
//! database_path = "/var/lib/rhsm/productid.js"
//! hooks_dir = "/etc/productid/hooks.d"
//! hook_timeout_secs = 30
//!
//! [backend]
//! command = "dnf"
//! rpm_command = "rpm"
//! cache_dir = "/var/cache/dnf"
//! ```

use crate::certificate::directory::DEFAULT_PRODUCT_DIR;
use crate::database::DEFAULT_DATABASE_PATH;
use crate::error::{Error, Result};
use crate::hooks::{DEFAULT_HOOKS_DIR, DEFAULT_HOOK_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default path for the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/productid/productid.toml";

/// Top level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding installed product certificates
    pub product_dir: PathBuf,

    /// Product to repository database file
    pub database_path: PathBuf,

    /// Directory holding plugin hook handlers
    pub hooks_dir: PathBuf,

    /// Per handler timeout in seconds
    pub hook_timeout_secs: u64,

    /// Package backend settings
    pub backend: BackendConfig,
}

/// Settings for the default dnf/rpm backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    /// Package manager command
    pub command: String,

    /// RPM database query command
    pub rpm_command: String,

    /// Repository metadata cache
    pub cache_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            product_dir: PathBuf::from(DEFAULT_PRODUCT_DIR),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            hooks_dir: PathBuf::from(DEFAULT_HOOKS_DIR),
            hook_timeout_secs: DEFAULT_HOOK_TIMEOUT.as_secs(),
            backend: BackendConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: "dnf".to_string(),
            rpm_command: "rpm".to_string(),
            cache_dir: PathBuf::from("/var/cache/dnf"),
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.hook_timeout_secs == 0 {
            return Err(Error::ConfigError(
                "hook_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.backend.command.trim().is_empty() {
            return Err(Error::ConfigError("backend.command must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(&temp_dir.path().join("productid.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.product_dir, PathBuf::from("/etc/pki/product"));
        assert_eq!(config.database_path, PathBuf::from("/var/lib/rhsm/productid.js"));
        assert_eq!(config.hook_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            product_dir = "/srv/product"

            [backend]
            command = "dnf5"
            "#,
        )
        .unwrap();
        assert_eq!(config.product_dir, PathBuf::from("/srv/product"));
        assert_eq!(config.backend.command, "dnf5");
        assert_eq!(config.backend.rpm_command, "rpm");
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(matches!(
            Config::parse("product_directory = \"/x\""),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        assert!(Config::parse("hook_timeout_secs = 0").is_err());
    }

    #[test]
    fn test_malformed_file_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("productid.toml");
        std::fs::write(&path, "product_dir = [").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("productid.toml"));
    }
}
