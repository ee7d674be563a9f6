//! # Configuration
//!
//! Explicit, validated configuration loading: a `flowvault.toml` file (when
//! present) layered under `FLOWVAULT_`-prefixed environment overrides, with
//! serde defaults for everything so an empty environment still yields a
//! usable configuration.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("flowvault")
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_retention_window() -> i64 {
    3
}

fn default_upload_deadline_secs() -> u64 {
    120
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowVaultConfig {
    /// Root under which per-upload scratch directories are created.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Root of the local artifact store.
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,

    /// Trailing number of project versions the reaper preserves.
    #[serde(default = "default_retention_window")]
    pub retention_window: i64,

    /// Deadline for extraction + validation + loading, in seconds. 0 turns
    /// the deadline off. Never applies to the commit phase.
    #[serde(default = "default_upload_deadline_secs")]
    pub upload_deadline_secs: u64,

    /// Validator names, run in this order.
    #[serde(default)]
    pub validator_order: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for FlowVaultConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            artifact_root: default_artifact_root(),
            retention_window: default_retention_window(),
            upload_deadline_secs: default_upload_deadline_secs(),
            validator_order: Vec::new(),
            database: DatabaseConfig::default(),
        }
    }
}

impl FlowVaultConfig {
    /// Load from `flowvault.toml` (optional) and the environment.
    /// `FLOWVAULT_RETENTION_WINDOW=5` overrides `retention_window`, nested
    /// keys use `__`: `FLOWVAULT_DATABASE__URL=...`.
    pub fn load() -> Result<Self, config::ConfigError> {
        Config::builder()
            .add_source(File::with_name("flowvault").required(false))
            .add_source(Environment::with_prefix("FLOWVAULT").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// The staging deadline; `None` when disabled.
    pub fn upload_deadline(&self) -> Option<Duration> {
        match self.upload_deadline_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = FlowVaultConfig::default();
        assert_eq!(config.retention_window, 3);
        assert_eq!(config.upload_deadline(), Some(Duration::from_secs(120)));
        assert!(config.validator_order.is_empty());
    }

    #[test]
    fn zero_deadline_disables_the_timeout() {
        let config = FlowVaultConfig {
            upload_deadline_secs: 0,
            ..FlowVaultConfig::default()
        };
        assert_eq!(config.upload_deadline(), None);
    }
}
