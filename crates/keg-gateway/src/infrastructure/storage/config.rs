//! TOML-based configuration for the device gateway.
//!
//! The host application owns where the file lives; this module only knows how
//! to read, write and validate it.  Example:
//!
//! ```toml
//! enabled = true
//! host = "0.0.0.0"
//! port = 5555
//! include_unknown_fields = false
//! idle_timeout_secs = 300
//! ```
//!
//! Every field has a serde default, so an empty file (or a missing one) yields
//! [`GatewayConfig::default()`], and files written by older versions keep
//! working when new fields are added.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `host` is not an IP address.
    #[error("invalid bind host '{0}': expected an IP address")]
    InvalidAddress(String),
}

/// Gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// When false the host application should not start the listener.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// IP address to bind the device listener to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port devices connect to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Keep unmapped pins as `_<kind>_<event-kind>_<pin>` fields instead of dropping them.
    #[serde(default)]
    pub include_unknown_fields: bool,
    /// Close a device connection after this many seconds without any bytes.
    /// `0` disables the timeout.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5555
}
fn default_idle_timeout_secs() -> u64 {
    300
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            host: default_host(),
            port: default_port(),
            include_unknown_fields: false,
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// The socket address the listener binds to.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `host` is not an IP address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// The idle timeout, or `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads a [`GatewayConfig`] from `path`, returning the defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => GatewayConfig::from_toml_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GatewayConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &GatewayConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = GatewayConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 5555);
        assert!(!cfg.include_unknown_fields);
        assert_eq!(cfg.idle_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg = GatewayConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(cfg, GatewayConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_defaults() {
        // Arrange
        let toml_str = r#"
port = 6000
include_unknown_fields = true
"#;

        // Act
        let cfg = GatewayConfig::from_toml_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.port, 6000);
        assert!(cfg.include_unknown_fields);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.host, "0.0.0.0");
        assert!(cfg.enabled);
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let result = GatewayConfig::from_toml_str("[[[ not valid toml");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_bind_addr_combines_host_and_port() {
        let cfg = GatewayConfig {
            host: "127.0.0.1".to_string(),
            port: 7000,
            ..GatewayConfig::default()
        };
        assert_eq!(cfg.bind_addr().unwrap(), "127.0.0.1:7000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_bind_addr_rejects_hostname() {
        let cfg = GatewayConfig {
            host: "kegs.local".to_string(),
            ..GatewayConfig::default()
        };
        assert!(matches!(
            cfg.bind_addr(),
            Err(ConfigError::InvalidAddress(h)) if h == "kegs.local"
        ));
    }

    #[test]
    fn test_zero_idle_timeout_disables_it() {
        let cfg = GatewayConfig {
            idle_timeout_secs: 0,
            ..GatewayConfig::default()
        };
        assert_eq!(cfg.idle_timeout(), None);
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = Path::new("/nonexistent/path/that/cannot/exist/gateway.toml");
        assert_eq!(load_config(path).unwrap(), GatewayConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("keg_gateway_test_{}", uuid::Uuid::new_v4()));
        let path = dir.join("gateway.toml");
        let cfg = GatewayConfig {
            enabled: false,
            port: 12345,
            ..GatewayConfig::default()
        };

        // Act
        save_config(&path, &cfg).expect("save");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }
}
