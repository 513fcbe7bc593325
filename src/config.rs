//! Configuration loading and types for DataGate.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct. Each subsection governs a different part of the
//! system: networking, the single accepted credential, object storage, and
//! the dataset sync cycle.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::auth::Credential;
use crate::sync::TriggerPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// The single accepted credential.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Dataset sync settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// AWS region to present (e.g. `us-east-1`).
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            region: default_region(),
        }
    }
}

/// Single-tenant credential settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Access key (also accepts `access_key_id`).
    #[serde(alias = "access_key_id", default = "default_access_key")]
    pub access_key: String,

    /// Secret access key (also accepts `secret_access_key`).
    #[serde(alias = "secret_access_key", default = "default_secret_key")]
    pub secret_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_key: default_access_key(),
            secret_key: default_secret_key(),
        }
    }
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for stored objects.
    #[serde(default = "default_storage_root")]
    pub root_dir: String,

    /// Part size for multipart-style ETag derivation; 0 = whole-file MD5.
    #[serde(default)]
    pub etag_part_size_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: default_storage_root(),
            etag_part_size_bytes: 0,
        }
    }
}

/// Dataset sync configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Checkout of the version-controlled dataset repository.
    #[serde(default = "default_git_folder")]
    pub git_folder: String,

    /// Dataset manifest file name inside the git folder; the pushed
    /// artifact is `<dataset>.dvc`.
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Branch pulled from and pushed to.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Trigger policy: `debounce` (quiet interval) or `countdown`
    /// (every N-th upload).
    #[serde(default = "default_policy")]
    pub policy: String,

    /// Quiet interval in seconds for the debounce policy.
    #[serde(default = "default_quiet_interval")]
    pub quiet_interval_secs: u64,

    /// Trigger count for the countdown policy.
    #[serde(default = "default_countdown")]
    pub countdown: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            git_folder: default_git_folder(),
            dataset: default_dataset(),
            branch: default_branch(),
            policy: default_policy(),
            quiet_interval_secs: default_quiet_interval(),
            countdown: default_countdown(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// The configured credential as the verifier consumes it.
    pub fn credential(&self) -> Credential {
        Credential {
            access_key_id: self.auth.access_key.clone(),
            secret_access_key: self.auth.secret_key.clone(),
        }
    }

    /// Resolve the configured trigger policy.
    pub fn trigger_policy(&self) -> anyhow::Result<TriggerPolicy> {
        match self.sync.policy.as_str() {
            "debounce" => Ok(TriggerPolicy::Debounce {
                quiet_interval: Duration::from_secs(self.sync.quiet_interval_secs),
            }),
            "countdown" => {
                if self.sync.countdown == 0 {
                    anyhow::bail!("sync.countdown must be at least 1");
                }
                Ok(TriggerPolicy::Countdown {
                    every: self.sync.countdown,
                })
            }
            other => anyhow::bail!("unknown sync.policy '{other}', expected debounce or countdown"),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9000
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_access_key() -> String {
    "datagate".to_string()
}

fn default_secret_key() -> String {
    "datagate-secret".to_string()
}

fn default_storage_root() -> String {
    "./data/objects".to_string()
}

fn default_git_folder() -> String {
    "./data/dataset-repo".to_string()
}

fn default_dataset() -> String {
    "dataset.json".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_policy() -> String {
    "debounce".to_string()
}

fn default_quiet_interval() -> u64 {
    30
}

fn default_countdown() -> u32 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}
