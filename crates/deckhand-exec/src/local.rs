//! Local script execution using `tokio::process`

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, instrument};

use crate::credentials::Secret;
use crate::error::ExecError;
use crate::result::{CommandResult, ConnectionInfo, ExecOptions};
use crate::traits::RemoteTransport;

/// Local transport
///
/// Feeds scripts to `bash -s` on the local machine as the current user.
/// Used for `localhost` targets and for exercising rendered scripts in tests.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    shell: String,
}

impl LocalTransport {
    /// Create a new local transport
    #[must_use]
    pub fn new() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }

    /// Internal method to execute a script
    async fn run_script(&self, script: &str, capture: bool) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        let mut child = Command::new(&self.shell)
            .arg("-s")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnError(e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecError::IoError("stdin not captured".to_string()))?;
        // bash may exit before reading the whole script
        if let Err(e) = stdin.write_all(script.as_bytes()).await
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(ExecError::IoError(e.to_string()));
        }
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();
        let status = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(status = status, duration = ?duration, "local script completed");

        Ok(CommandResult {
            status,
            output: capture.then(|| String::from_utf8_lossy(&output.stdout).to_string()),
            stderr,
            duration,
        })
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteTransport for LocalTransport {
    #[instrument(skip(self, _secret, script), fields(host = %conn.host), level = "debug")]
    async fn execute(
        &self,
        conn: &ConnectionInfo,
        _secret: &Secret,
        script: &str,
        options: ExecOptions,
    ) -> Result<CommandResult, ExecError> {
        debug!(bytes = script.len(), "executing local script");

        let Some(timeout_duration) = options.timeout else {
            return self.run_script(script, options.capture_output).await;
        };

        let start = Instant::now();
        match timeout(
            timeout_duration,
            self.run_script(script, options.capture_output),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "script timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    fn transport_type(&self) -> &'static str {
        "local"
    }
}

/// Shorthand used by tests and the CLI for the local connection
#[must_use]
pub fn local_connection() -> ConnectionInfo {
    ConnectionInfo::new("localhost", std::env::var("USER").unwrap_or_default())
}
