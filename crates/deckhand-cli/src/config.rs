//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use deckhand_ops::ExecutorConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration for the deckhand CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub launch: LaunchConfig,
    #[serde(default)]
    pub placeholders: PlaceholderConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// SSH connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Port used when `--port` is not given
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds to wait for the TCP connection and handshake
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Private key to authenticate with instead of the password
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout: default_connect_timeout(),
            key_path: None,
        }
    }
}

/// Where credentials come from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// TOML file of `[name]` tables; the environment is used when unset
    #[serde(default)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: u32,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            settle_seconds: default_settle_seconds(),
            log_tail_lines: default_log_tail_lines(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceholderConfig {
    /// Fail prepare-env when placeholders are left unreplaced
    #[serde(default)]
    pub strict: bool,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_settle_seconds() -> u64 {
    3
}

fn default_log_tail_lines() -> u32 {
    50
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("cannot read {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("invalid config {}: {e}", path.display()))?;
        Ok(config)
    }

    /// Find the config file to use
    ///
    /// An explicit path or `DECKHAND_CONFIG` is returned even if it does not
    /// exist, so loading it reports the error. The search paths are only
    /// returned when present.
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        if let Ok(path) = std::env::var("DECKHAND_CONFIG") {
            return Some(PathBuf::from(path));
        }

        let mut paths = vec![
            PathBuf::from("deckhand.toml"),
            PathBuf::from("/etc/deckhand/deckhand.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("deckhand/deckhand.toml"));
        }

        paths.into_iter().find(|p| p.exists())
    }

    /// Settings handed to the operation executor
    #[must_use]
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            launch_settle_seconds: self.launch.settle_seconds,
            launch_log_tail_lines: self.launch.log_tail_lines,
            strict_placeholders: self.placeholders.strict,
        }
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.connect_timeout)
    }
}
