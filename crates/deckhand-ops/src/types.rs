//! Type definitions shared by every operation

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use deckhand_exec::{ConnectionInfo, CredentialRef};
use serde::{Deserialize, Serialize};

/// The six operations the executor knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Check out or fast-forward a git repository
    Clone,
    /// Install missing system packages
    InstallDependencies,
    /// Run a Python installer script
    RunInstaller,
    /// Render and write a configuration file
    PrepareEnvironment,
    /// Start a detached background process
    Launch,
    /// Run a caller-supplied script
    RunCommand,
}

impl OperationKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Clone => "clone",
            OperationKind::InstallDependencies => "install-dependencies",
            OperationKind::RunInstaller => "run-installer",
            OperationKind::PrepareEnvironment => "prepare-environment",
            OperationKind::Launch => "launch",
            OperationKind::RunCommand => "run-command",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host an operation runs against
///
/// Borrowed for the duration of one call and never retained.
#[derive(Debug, Clone)]
pub struct RemoteTarget {
    /// Host name or address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Handle the credential provider resolves
    pub credential: CredentialRef,
}

impl RemoteTarget {
    pub fn new(host: impl Into<String>, credential: CredentialRef) -> Self {
        Self {
            host: host.into(),
            port: 22,
            credential,
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Connection details for the given login user
    #[must_use]
    pub fn connection(&self, user: &str) -> ConnectionInfo {
        ConnectionInfo::new(&self.host, user).with_port(self.port)
    }
}

/// Package manager used by install-dependencies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageManagerKind {
    /// Detect on the host: apt-get, then dnf, then yum
    #[default]
    Auto,
    /// APT (Debian/Ubuntu)
    Apt,
    /// DNF (Fedora/RHEL 8+)
    Dnf,
    /// YUM (CentOS 7/RHEL 7)
    Yum,
}

impl fmt::Display for PackageManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageManagerKind::Auto => write!(f, "auto"),
            PackageManagerKind::Apt => write!(f, "apt"),
            PackageManagerKind::Dnf => write!(f, "dnf"),
            PackageManagerKind::Yum => write!(f, "yum"),
        }
    }
}

impl std::str::FromStr for PackageManagerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(PackageManagerKind::Auto),
            "apt" | "apt-get" => Ok(PackageManagerKind::Apt),
            "dnf" => Ok(PackageManagerKind::Dnf),
            "yum" => Ok(PackageManagerKind::Yum),
            other => Err(format!("unknown package manager: {other}")),
        }
    }
}

/// Ordered mapping of literal placeholder tokens to values
///
/// Keys are matched literally, e.g. `{{DB_HOST}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Substitutions(Vec<(String, String)>);

impl Substitutions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mapping, replacing the value of an existing key in place
    #[must_use]
    pub fn with(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(token, value);
        self
    }

    /// Append a mapping, replacing the value of an existing key in place
    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        let token = token.into();
        let value = value.into();
        match self.0.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = value,
            None => self.0.push((token, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Substitutions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut subs = Substitutions::new();
        for (k, v) in iter {
            subs.insert(k, v);
        }
        subs
    }
}

/// Commit reported after a clone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit hash
    pub hash: String,
    /// First line of the commit message
    pub subject: String,
}

/// Outcome of one operation
///
/// Built once by the result interpreter and not modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    /// Operation that produced this result
    pub operation: OperationKind,
    /// Host the operation ran on
    pub host: String,
    /// Whether the operation succeeded
    pub succeeded: bool,
    /// Remote exit status, if the script ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Captured stdout, secrets masked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Identifier of a started background process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
    /// Failure detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal findings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Log file of a launched process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
    /// Checked-out commit after a clone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitInfo>,
    /// Time spent in the transport round trip
    pub duration: Duration,
    /// When the result was produced
    pub completed_at: DateTime<Utc>,
}
