//! Error types for deckhand-ops

use deckhand_exec::{CredentialError, ExecError};
use thiserror::Error;

use crate::types::OperationKind;

/// Reasons a request is rejected before anything is sent to the host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// One or more package names fall outside `[A-Za-z0-9._+-]`
    #[error("invalid package names: {}", .0.join(", "))]
    InvalidPackageNames(Vec<String>),

    /// Install request without packages
    #[error("no packages given")]
    NoPackages,

    /// Path contains `;`, `|` or `&`
    #[error("{field} contains a shell metacharacter: {value:?}")]
    ShellMetacharacter {
        /// Request field that was rejected
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Path contains a newline or NUL byte
    #[error("{field} contains a control character: {value:?}")]
    ControlCharacter {
        /// Request field that was rejected
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Required value is empty
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Destination path is absolute
    #[error("destination path must be relative: {0}")]
    AbsoluteDestination(String),

    /// Destination path climbs out of the working directory
    #[error("destination path must not contain '..': {0}")]
    ParentTraversal(String),

    /// URL is neither http(s) nor scp-style git
    #[error("repository URL must start with http://, https:// or git@: {0}")]
    InvalidRepoUrl(String),

    /// Branch name outside the allowed character set
    #[error("invalid branch name: {0:?}")]
    InvalidBranch(String),

    /// Environment variable name is not a shell identifier
    #[error("invalid environment variable name: {0:?}")]
    InvalidEnvName(String),

    /// Clean clone would remove the filesystem root
    #[error("refusing to remove {0:?}")]
    RefusedRemoval(String),

    /// Strict mode found placeholders without a substitution
    #[error("unreplaced placeholders: {}", .0.join(", "))]
    UnreplacedPlaceholders(Vec<String>),
}

/// Script template rendering errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template {template}: token {token} has no binding")]
    UnboundToken {
        template: &'static str,
        token: String,
    },

    #[error("template {template}: binding {token} matches no token")]
    UnknownToken {
        template: &'static str,
        token: String,
    },

    #[error("template {template}: token {token} appears more than once")]
    RepeatedToken {
        template: &'static str,
        token: String,
    },

    #[error("template {template}: token {token} bound twice")]
    DuplicateBinding {
        template: &'static str,
        token: String,
    },
}

/// Errors raised by an operation
///
/// Every variant names the operation and the host so a failure line in an
/// orchestrator log is enough to diagnose it.
#[derive(Error, Debug)]
pub enum OperationError {
    /// Request rejected before any network interaction
    #[error("{operation} on {host}: invalid request: {reason}")]
    Validation {
        operation: OperationKind,
        host: String,
        #[source]
        reason: ValidationError,
    },

    /// Credential provider could not supply credentials
    #[error("{operation} on {host}: credentials unavailable: {source}")]
    Credentials {
        operation: OperationKind,
        host: String,
        #[source]
        source: CredentialError,
    },

    /// Script could not be rendered
    #[error("{operation} on {host}: {source}")]
    Template {
        operation: OperationKind,
        host: String,
        #[source]
        source: TemplateError,
    },

    /// Transport failed (unreachable host, authentication, timeout)
    #[error("{operation} on {host}: transport failed: {source}")]
    Transport {
        operation: OperationKind,
        host: String,
        #[source]
        source: ExecError,
    },

    /// Remote script exited non-zero
    #[error("{operation} on {host}: remote script exited with status {status}: {detail}")]
    RemoteFailed {
        operation: OperationKind,
        host: String,
        status: i32,
        detail: String,
    },
}

impl OperationError {
    /// Operation the error belongs to
    #[must_use]
    pub fn operation(&self) -> OperationKind {
        match self {
            OperationError::Validation { operation, .. }
            | OperationError::Credentials { operation, .. }
            | OperationError::Template { operation, .. }
            | OperationError::Transport { operation, .. }
            | OperationError::RemoteFailed { operation, .. } => *operation,
        }
    }

    /// Whether the request was rejected without contacting the host
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, OperationError::Validation { .. })
    }

    /// Remote exit status, if the script ran
    #[must_use]
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            OperationError::RemoteFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            OperationError::Transport { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_operation_and_host() {
        let err = OperationError::Validation {
            operation: OperationKind::InstallDependencies,
            host: "app01".to_string(),
            reason: ValidationError::InvalidPackageNames(vec![
                "curl;id".to_string(),
                "$(x)".to_string(),
            ]),
        };

        assert_eq!(
            err.to_string(),
            "install-dependencies on app01: invalid request: invalid package names: curl;id, $(x)"
        );
        assert!(err.is_validation());
        assert_eq!(err.exit_status(), None);
    }

    #[test]
    fn test_remote_failure_carries_status() {
        let err = OperationError::RemoteFailed {
            operation: OperationKind::Clone,
            host: "app01".to_string(),
            status: 128,
            detail: "fatal: repository not found".to_string(),
        };

        assert!(err.to_string().contains("clone on app01"));
        assert!(err.to_string().contains("status 128"));
        assert_eq!(err.exit_status(), Some(128));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transport_retryable() {
        let err = OperationError::Transport {
            operation: OperationKind::Launch,
            host: "app01".to_string(),
            source: ExecError::ConnectionFailed("refused".to_string()),
        };
        assert!(err.is_retryable());
    }
}
