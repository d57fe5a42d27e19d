//! Error types for deckhand-exec

use std::time::Duration;

use thiserror::Error;

/// Transport-level failures
///
/// A non-zero remote exit status is never an `ExecError`; it is reported
/// through [`CommandResult::status`](crate::result::CommandResult).
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Script did not finish within the requested time
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Remote side closed the channel without reporting an exit status
    #[error("remote closed the channel without an exit status")]
    NoExitStatus,
}

impl ExecError {
    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed(_) | ExecError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ExecError::ConnectionFailed("refused".to_string()).is_retryable());
        assert!(
            ExecError::Timeout {
                timeout: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(!ExecError::AuthenticationFailed("denied".to_string()).is_retryable());
        assert!(!ExecError::NoExitStatus.is_retryable());
    }
}
