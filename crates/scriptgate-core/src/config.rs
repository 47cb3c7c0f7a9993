//! Daemon configuration parsing.
//!
//! Configuration lives in a TOML file with a single `[gateway]` section:
//!
//! ```toml
//! [gateway]
//! listen_addr = "127.0.0.1:8080"
//! cert_dir = "./certs"
//! workers = 4
//! queue_capacity = 16
//! request_deadline_secs = 30
//! max_script_bytes = 1048576
//! ```
//!
//! Every field has a default; an empty file (or an absent one, at the
//! daemon's discretion) yields a fully usable configuration. `validate`
//! runs after parsing and after CLI overrides are applied, so an invalid
//! value is rejected no matter where it came from.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScriptgateConfig {
    /// Gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl ScriptgateConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }
}

/// Gateway settings: where to listen, where trust comes from, and how
/// much concurrent work to admit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// TCP listen address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Directory holding `*.cert` trust-store records.
    #[serde(default = "default_cert_dir")]
    pub cert_dir: PathBuf,

    /// Number of worker tasks processing requests (`W`).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacity of the pending-request queue (`C`). When the queue is
    /// full, the accept loop blocks until a worker frees a slot.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Per-request deadline in seconds, measured from dequeue to
    /// response write. `0` disables the deadline.
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,

    /// Maximum script size in bytes, enforced by the size-limit policy
    /// before authentication. Absent means no policy: every script
    /// length is admitted.
    #[serde(default)]
    pub max_script_bytes: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            cert_dir: default_cert_dir(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            request_deadline_secs: default_request_deadline_secs(),
            max_script_bytes: None,
        }
    }
}

impl GatewayConfig {
    /// Checks invariants that serde defaults cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `workers` or
    /// `queue_capacity` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Validation(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The per-request deadline, or `None` when disabled.
    #[must_use]
    pub const fn request_deadline(&self) -> Option<Duration> {
        if self.request_deadline_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_deadline_secs))
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_cert_dir() -> PathBuf {
    PathBuf::from("./certs")
}

const fn default_workers() -> usize {
    4
}

const fn default_queue_capacity() -> usize {
    16
}

const fn default_request_deadline_secs() -> u64 {
    30
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ScriptgateConfig::from_toml("").unwrap();
        assert_eq!(config.gateway, GatewayConfig::default());
        assert_eq!(config.gateway.workers, 4);
        assert_eq!(config.gateway.queue_capacity, 16);
        assert_eq!(
            config.gateway.request_deadline(),
            Some(Duration::from_secs(30))
        );
        assert!(config.gateway.max_script_bytes.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [gateway]
            listen_addr = "0.0.0.0:9090"
            cert_dir = "/etc/scriptgate/certs"
            workers = 8
            queue_capacity = 64
            request_deadline_secs = 10
            max_script_bytes = 1048576
        "#;

        let config = ScriptgateConfig::from_toml(toml).unwrap();
        assert_eq!(config.gateway.listen_addr, "0.0.0.0:9090".parse().unwrap());
        assert_eq!(
            config.gateway.cert_dir,
            PathBuf::from("/etc/scriptgate/certs")
        );
        assert_eq!(config.gateway.workers, 8);
        assert_eq!(config.gateway.queue_capacity, 64);
        assert_eq!(config.gateway.max_script_bytes, Some(1_048_576));
    }

    #[test]
    fn test_zero_deadline_disables() {
        let toml = r#"
            [gateway]
            request_deadline_secs = 0
        "#;

        let config = ScriptgateConfig::from_toml(toml).unwrap();
        assert_eq!(config.gateway.request_deadline(), None);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let toml = r#"
            [gateway]
            workers = 0
        "#;

        let config = ScriptgateConfig::from_toml(toml).unwrap();
        let err = config.gateway.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let toml = r#"
            [gateway]
            queue_capacity = 0
        "#;

        let config = ScriptgateConfig::from_toml(toml).unwrap();
        assert!(config.gateway.validate().is_err());
    }

    #[test]
    fn test_invalid_listen_addr_rejected() {
        let toml = r#"
            [gateway]
            listen_addr = "not-an-address"
        "#;

        assert!(matches!(
            ScriptgateConfig::from_toml(toml),
            Err(ConfigError::Parse(_))
        ));
    }
}
