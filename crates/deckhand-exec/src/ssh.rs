//! SSH script execution using russh crate

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::credentials::Secret;
use crate::error::ExecError;
use crate::result::{CommandResult, ConnectionInfo, ExecOptions};
use crate::traits::RemoteTransport;

/// Remote command that reads the script from stdin
const REMOTE_SHELL: &str = "bash -s";

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Accept all server keys (like StrictHostKeyChecking=no)
        // In production, this should verify against known_hosts
        Ok(true)
    }
}

/// SSH transport
///
/// Opens a fresh session for every script, authenticates with the call's
/// credentials and disconnects when the script exits. No session outlives
/// a call.
#[derive(Debug, Clone)]
pub struct SshTransport {
    /// Bound on TCP connect plus handshake
    connect_timeout: Duration,
    /// Private key to authenticate with instead of the password
    key_path: Option<PathBuf>,
}

impl SshTransport {
    /// Create a transport using password authentication
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            key_path: None,
        }
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Authenticate with a private key file
    ///
    /// The secret is still used for privilege elevation on the remote side.
    #[must_use]
    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Connect and authenticate
    #[instrument(skip(self, secret), fields(host = %conn.host))]
    async fn connect(
        &self,
        conn: &ConnectionInfo,
        secret: &Secret,
    ) -> Result<client::Handle<SshClientHandler>, ExecError> {
        info!(
            host = %conn.host,
            port = conn.port,
            user = %conn.user,
            "connecting to SSH"
        );

        let config = Arc::new(client::Config::default());

        let mut session = timeout(
            self.connect_timeout,
            client::connect(config, (conn.host.as_str(), conn.port), SshClientHandler),
        )
        .await
        .map_err(|_| {
            ExecError::ConnectionFailed(format!(
                "no answer within {:?}",
                self.connect_timeout
            ))
        })?
        .map_err(|e| ExecError::ConnectionFailed(e.to_string()))?;

        let auth_res = if let Some(key_path) = &self.key_path {
            let key_pair = load_secret_key(key_path, None)
                .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

            let hash_alg = session
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();
            session
                .authenticate_publickey(
                    &conn.user,
                    PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
                )
                .await
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?
        } else {
            session
                .authenticate_password(&conn.user, secret.expose())
                .await
                .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?
        };

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(format!(
                "server rejected credentials for {}",
                conn.user
            )));
        }

        info!(host = %conn.host, "SSH connected and authenticated");

        Ok(session)
    }

    /// Run the script over an authenticated session
    async fn run_script(
        session: &client::Handle<SshClientHandler>,
        script: &str,
        capture: bool,
    ) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, REMOTE_SHELL)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .data(script.as_bytes())
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;
        channel
            .eof()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut status = None;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // The exit status may arrive after EOF, so drain until the channel closes
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => {
                    stdout.extend_from_slice(&data);
                }
                ChannelMsg::ExtendedData { data, ext } => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    status = Some(exit_status.cast_signed());
                }
                _ => {}
            }
        }

        let status = status.ok_or(ExecError::NoExitStatus)?;
        let duration = start.elapsed();

        debug!(status = status, duration = ?duration, "remote script completed");

        Ok(CommandResult {
            status,
            output: capture.then(|| String::from_utf8_lossy(&stdout).to_string()),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            duration,
        })
    }

    async fn disconnect(session: client::Handle<SshClientHandler>, host: &str) {
        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            warn!(host = %host, error = %e, "SSH disconnect failed");
        } else {
            debug!(host = %host, "SSH disconnected");
        }
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteTransport for SshTransport {
    #[instrument(skip(self, secret, script), fields(host = %conn.host))]
    async fn execute(
        &self,
        conn: &ConnectionInfo,
        secret: &Secret,
        script: &str,
        options: ExecOptions,
    ) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        debug!(bytes = script.len(), timeout = ?options.timeout, "executing remote script");

        // Connection setup is bounded by connect_timeout, not the script timeout
        let session = self.connect(conn, secret).await?;

        let result = match options.timeout {
            Some(timeout_duration) => {
                match timeout(
                    timeout_duration,
                    Self::run_script(&session, script, options.capture_output),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        error!(
                            timeout = ?timeout_duration,
                            elapsed = ?start.elapsed(),
                            "remote script timed out"
                        );
                        Err(ExecError::Timeout {
                            timeout: timeout_duration,
                        })
                    }
                }
            }
            None => Self::run_script(&session, script, options.capture_output).await,
        };

        Self::disconnect(session, &conn.host).await;

        result
    }

    fn transport_type(&self) -> &'static str {
        "ssh"
    }
}
