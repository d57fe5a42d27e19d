//! Request types, one per operation

use serde::{Deserialize, Serialize};

use crate::types::{OperationKind, PackageManagerKind, Substitutions};

/// Check out `branch` of `repo_url` into `workdir`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneRequest {
    pub workdir: String,
    pub repo_url: String,
    pub branch: String,
    /// Remove any existing working directory first
    #[serde(default)]
    pub clean_clone: bool,
}

/// Install system packages that are not yet present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallDependenciesRequest {
    pub packages: Vec<String>,
    #[serde(default)]
    pub package_manager: PackageManagerKind,
}

/// Run `<python_bin> <installer_script> <extra_args...>` inside `workdir`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInstallerRequest {
    pub workdir: String,
    pub installer_script: String,
    #[serde(default = "default_python")]
    pub python_bin: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_python() -> String {
    "python3".to_string()
}

/// Render `template_body` and write it to `workdir/dest_path` with mode 0600
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareEnvironmentRequest {
    pub workdir: String,
    pub template_body: String,
    /// Destination relative to `workdir`
    pub dest_path: String,
    #[serde(default)]
    pub substitutions: Substitutions,
}

/// Start `script_path` detached, logging to `log_path`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub workdir: String,
    pub script_path: String,
    /// Exported before the process starts, in order
    #[serde(default)]
    pub env_vars: Vec<(String, String)>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Program that runs the script; the script is executed directly if unset
    #[serde(default)]
    pub interpreter: Option<String>,
    pub log_path: String,
}

/// Run a caller-supplied script body verbatim
///
/// This is the escape hatch for anything the other operations do not
/// cover; the body is trusted as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCommandRequest {
    /// Directory to run in; the login directory if unset
    #[serde(default)]
    pub workdir: Option<String>,
    pub script: String,
    /// Wait for the script to finish, or detach it and return at once
    #[serde(default = "default_wait")]
    pub wait: bool,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

fn default_wait() -> bool {
    true
}

/// Closed set of operation requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum OperationRequest {
    Clone(CloneRequest),
    InstallDependencies(InstallDependenciesRequest),
    RunInstaller(RunInstallerRequest),
    PrepareEnvironment(PrepareEnvironmentRequest),
    Launch(LaunchRequest),
    RunCommand(RunCommandRequest),
}

impl OperationRequest {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Clone(_) => OperationKind::Clone,
            OperationRequest::InstallDependencies(_) => OperationKind::InstallDependencies,
            OperationRequest::RunInstaller(_) => OperationKind::RunInstaller,
            OperationRequest::PrepareEnvironment(_) => OperationKind::PrepareEnvironment,
            OperationRequest::Launch(_) => OperationKind::Launch,
            OperationRequest::RunCommand(_) => OperationKind::RunCommand,
        }
    }
}
