//! Result and option types for script execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of running one script on a host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output, present only when capture was requested
    pub output: Option<String>,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if the script succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Captured stdout, or an empty string in status-only mode
    #[must_use]
    pub fn stdout(&self) -> &str {
        self.output.as_deref().unwrap_or_default()
    }

    /// Combine stdout and stderr
    #[must_use]
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout();
        if self.stderr.is_empty() {
            stdout.to_string()
        } else if stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", stdout, self.stderr)
        }
    }
}

/// How a single script invocation should be run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Keep stdout in the returned [`CommandResult`]
    pub capture_output: bool,
    /// Upper bound on the whole round trip
    pub timeout: Option<Duration>,
}

impl ExecOptions {
    /// Status-only mode
    #[must_use]
    pub fn status_only() -> Self {
        Self::default()
    }

    /// Output-capture mode
    #[must_use]
    pub fn capture() -> Self {
        Self {
            capture_output: true,
            timeout: None,
        }
    }

    /// Set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Connection information for SSH
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Host address
    pub host: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username
    pub user: String,
}

fn default_port() -> u16 {
    22
}

impl ConnectionInfo {
    /// Create new connection info
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: user.into(),
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Whether the host names the local machine
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }
}
