//! Remote script bodies, one per operation
//!
//! Each function binds already-validated request fields into its template.
//! Bindings are listed in the same order the tokens appear in the template.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use deckhand_exec::Secret;

use crate::error::TemplateError;
use crate::request::{
    CloneRequest, InstallDependenciesRequest, LaunchRequest, RunCommandRequest,
    RunInstallerRequest,
};
use crate::shell::{ScriptTemplate, quote};

const CLONE: &str = include_str!("templates/clone.sh");
const INSTALL: &str = include_str!("templates/install.sh");
const RUN_INSTALLER: &str = include_str!("templates/run_installer.sh");
const PREPARE_ENVIRONMENT: &str = include_str!("templates/prepare_environment.sh");
const LAUNCH: &str = include_str!("templates/launch.sh");
const RUN_COMMAND: &str = include_str!("templates/run_command.sh");
const RUN_COMMAND_DETACHED: &str = include_str!("templates/run_command_detached.sh");

/// Launch tuning that does not come from the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchSettings {
    /// Seconds to wait before the liveness check
    pub settle_seconds: u64,
    /// Log lines returned when the process died
    pub log_tail_lines: u32,
}

pub fn clone(req: &CloneRequest) -> Result<String, TemplateError> {
    ScriptTemplate::new("clone", CLONE)
        .bind_quoted("WORKDIR", &req.workdir)
        .bind_quoted("REPO_URL", &req.repo_url)
        .bind_quoted("BRANCH", &req.branch)
        .bind_quoted("CLEAN", if req.clean_clone { "1" } else { "0" })
        .render()
}

pub fn install(req: &InstallDependenciesRequest, secret: &Secret) -> Result<String, TemplateError> {
    ScriptTemplate::new("install", INSTALL)
        .bind_quoted("PACKAGES", &req.packages.join(" "))
        .bind_quoted("MANAGER", &req.package_manager.to_string())
        .bind_quoted("SECRET", secret.expose())
        .render()
}

pub fn run_installer(req: &RunInstallerRequest) -> Result<String, TemplateError> {
    ScriptTemplate::new("run-installer", RUN_INSTALLER)
        .bind_quoted("WORKDIR", &req.workdir)
        .bind_quoted("INSTALLER", &req.installer_script)
        .bind_quoted("PYTHON_BIN", &req.python_bin)
        .bind_words("EXTRA_ARGS", &req.extra_args)
        .render()
}

/// `body` is the config after local placeholder substitution
pub fn prepare_environment(
    workdir: &str,
    dest_path: &str,
    body: &str,
) -> Result<String, TemplateError> {
    ScriptTemplate::new("prepare-environment", PREPARE_ENVIRONMENT)
        .bind_quoted("WORKDIR", workdir)
        .bind_quoted("DEST_PATH", dest_path)
        .bind_quoted("PAYLOAD", &STANDARD.encode(body))
        .render()
}

pub fn launch(req: &LaunchRequest, settings: LaunchSettings) -> Result<String, TemplateError> {
    ScriptTemplate::new("launch", LAUNCH)
        .bind_quoted("WORKDIR", &req.workdir)
        .bind_quoted("SCRIPT_PATH", &req.script_path)
        .bind_quoted("INTERPRETER", req.interpreter.as_deref().unwrap_or_default())
        .bind_quoted("LOG_PATH", &req.log_path)
        .bind_quoted("SETTLE_SECONDS", &settings.settle_seconds.to_string())
        .bind_quoted("TAIL_LINES", &settings.log_tail_lines.to_string())
        .bind_words("ARGS", &req.args)
        .bind_raw("EXPORTS", exports(&req.env_vars))
        .render()
}

pub fn run_command(req: &RunCommandRequest) -> Result<String, TemplateError> {
    let template = if req.wait {
        ScriptTemplate::new("run-command", RUN_COMMAND)
    } else {
        ScriptTemplate::new("run-command-detached", RUN_COMMAND_DETACHED)
    };

    template
        .bind_quoted("WORKDIR", req.workdir.as_deref().unwrap_or_default())
        .bind_raw("BODY", req.script.clone())
        .render()
}

/// `export NAME='value'` lines; names must already be validated identifiers
fn exports(env_vars: &[(String, String)]) -> String {
    env_vars
        .iter()
        .map(|(name, value)| format!("export {name}={}", quote(value)))
        .collect::<Vec<_>>()
        .join("\n")
}
