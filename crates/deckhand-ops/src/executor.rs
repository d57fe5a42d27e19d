//! `OperationExecutor`: validate, render, invoke, interpret
//!
//! Every operation runs the same four steps. Validation happens first and
//! never touches the network; the transport is invoked exactly once per
//! call; the raw result is masked and interpreted into an
//! [`OperationResult`].

use std::sync::Arc;
use std::time::Duration;

use deckhand_exec::{
    CommandResult, CredentialProvider, Credentials, ExecError, ExecOptions, RemoteTransport,
};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ExecutorConfig;
use crate::error::{OperationError, TemplateError, ValidationError};
use crate::interpret::Outcome;
use crate::placeholder;
use crate::request::{
    CloneRequest, InstallDependenciesRequest, LaunchRequest, OperationRequest,
    PrepareEnvironmentRequest, RunCommandRequest, RunInstallerRequest,
};
use crate::scripts;
use crate::types::{OperationKind, OperationResult, RemoteTarget};
use crate::validate;

/// Runs the fixed catalogue of operations against one host per call
///
/// Holds no per-call state, so one executor can serve concurrent callers.
pub struct OperationExecutor {
    transport: Arc<dyn RemoteTransport>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for OperationExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationExecutor")
            .field("transport", &self.transport.transport_type())
            .field("config", &self.config)
            .finish()
    }
}

/// One operation against one target
#[derive(Clone, Copy)]
struct Call<'a> {
    operation: OperationKind,
    target: &'a RemoteTarget,
}

impl Call<'_> {
    fn host(&self) -> String {
        self.target.host.clone()
    }

    fn outcome(&self) -> Outcome<'_> {
        Outcome {
            operation: self.operation,
            host: &self.target.host,
        }
    }

    fn check(
        &self,
        checks: impl FnOnce() -> Result<(), ValidationError>,
    ) -> Result<(), OperationError> {
        checks().map_err(|reason| {
            warn!(
                operation = %self.operation,
                host = %self.target.host,
                reason = %reason,
                "request rejected"
            );
            OperationError::Validation {
                operation: self.operation,
                host: self.host(),
                reason,
            }
        })
    }

    fn acquire(&self, provider: &dyn CredentialProvider) -> Result<Credentials, OperationError> {
        provider
            .acquire(&self.target.credential)
            .map_err(|source| OperationError::Credentials {
                operation: self.operation,
                host: self.host(),
                source,
            })
    }

    fn rendered(&self, script: Result<String, TemplateError>) -> Result<String, OperationError> {
        let script = script.map_err(|source| OperationError::Template {
            operation: self.operation,
            host: self.host(),
            source,
        })?;
        debug!(operation = %self.operation, bytes = script.len(), "script rendered");
        Ok(script)
    }

    fn transport_error(&self, source: ExecError) -> OperationError {
        OperationError::Transport {
            operation: self.operation,
            host: self.host(),
            source,
        }
    }
}

impl OperationExecutor {
    /// Create an executor over a transport with default settings
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            transport,
            config: ExecutorConfig::default(),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Dispatch a request to its operation
    ///
    /// # Errors
    /// See the individual operations.
    pub async fn execute(
        &self,
        target: &RemoteTarget,
        credentials: &dyn CredentialProvider,
        request: &OperationRequest,
    ) -> Result<OperationResult, OperationError> {
        match request {
            OperationRequest::Clone(req) => self.clone_repository(target, credentials, req).await,
            OperationRequest::InstallDependencies(req) => {
                self.install_dependencies(target, credentials, req).await
            }
            OperationRequest::RunInstaller(req) => {
                self.run_installer(target, credentials, req).await
            }
            OperationRequest::PrepareEnvironment(req) => {
                self.prepare_environment(target, credentials, req).await
            }
            OperationRequest::Launch(req) => self.launch(target, credentials, req).await,
            OperationRequest::RunCommand(req) => self.run_command(target, credentials, req).await,
        }
    }

    /// Hand the script to the transport once and mask the secret in what
    /// comes back
    async fn invoke(
        &self,
        call: Call<'_>,
        credentials: &Credentials,
        script: &str,
        options: ExecOptions,
    ) -> Result<CommandResult, ExecError> {
        let conn = call.target.connection(&credentials.username);

        info!(
            operation = %call.operation,
            host = %call.target.host,
            transport = self.transport.transport_type(),
            "running remote script"
        );

        let mut result = self
            .transport
            .execute(&conn, &credentials.secret, script, options)
            .await?;

        result.output = result.output.map(|out| credentials.secret.mask(&out));
        result.stderr = credentials.secret.mask(&result.stderr);

        debug!(
            operation = %call.operation,
            status = result.status,
            duration = ?result.duration,
            "remote script finished"
        );

        Ok(result)
    }

    /// Shared tail of the boolean-style operations
    async fn run_boolean(
        &self,
        call: Call<'_>,
        credentials: &Credentials,
        script: &str,
        warnings: Vec<String>,
    ) -> Result<OperationResult, OperationError> {
        let result = self
            .invoke(call, credentials, script, ExecOptions::capture())
            .await
            .map_err(|e| call.transport_error(e))?;

        let interpreted = call.outcome().boolean(result, warnings);
        match &interpreted {
            Ok(result) => info!(
                operation = %call.operation,
                host = %call.target.host,
                duration = ?result.duration,
                "operation succeeded"
            ),
            Err(e) => error!(error = %e, "operation failed"),
        }
        interpreted
    }

    /// Check out or fast-forward a repository
    ///
    /// # Errors
    /// Validation, credential, transport, or non-zero exit of the script
    #[instrument(skip_all, fields(host = %target.host, workdir = %req.workdir, branch = %req.branch))]
    pub async fn clone_repository(
        &self,
        target: &RemoteTarget,
        credentials: &dyn CredentialProvider,
        req: &CloneRequest,
    ) -> Result<OperationResult, OperationError> {
        let call = Call {
            operation: OperationKind::Clone,
            target,
        };

        call.check(|| {
            validate::path("workdir", &req.workdir)?;
            if req.clean_clone {
                validate::removable_dir(&req.workdir)?;
            }
            validate::repo_url(&req.repo_url)?;
            validate::branch(&req.branch)
        })?;

        let creds = call.acquire(credentials)?;
        let script = call.rendered(scripts::clone(req))?;
        let result = self.run_boolean(call, &creds, &script, Vec::new()).await?;

        if let Some(commit) = &result.commit {
            info!(hash = %commit.hash, subject = %commit.subject, "checked out");
        }
        Ok(result)
    }

    /// Install the packages that are not installed yet
    ///
    /// # Errors
    /// Validation (any invalid package name rejects the whole list),
    /// credential, transport, or non-zero exit of the script
    #[instrument(skip_all, fields(host = %target.host, packages = req.packages.len()))]
    pub async fn install_dependencies(
        &self,
        target: &RemoteTarget,
        credentials: &dyn CredentialProvider,
        req: &InstallDependenciesRequest,
    ) -> Result<OperationResult, OperationError> {
        let call = Call {
            operation: OperationKind::InstallDependencies,
            target,
        };

        call.check(|| validate::packages(&req.packages))?;

        let creds = call.acquire(credentials)?;
        let script = call.rendered(scripts::install(req, &creds.secret))?;
        self.run_boolean(call, &creds, &script, Vec::new()).await
    }

    /// Run a Python installer inside the working directory
    ///
    /// # Errors
    /// Validation, credential, transport, or non-zero exit of the installer
    #[instrument(skip_all, fields(host = %target.host, installer = %req.installer_script))]
    pub async fn run_installer(
        &self,
        target: &RemoteTarget,
        credentials: &dyn CredentialProvider,
        req: &RunInstallerRequest,
    ) -> Result<OperationResult, OperationError> {
        let call = Call {
            operation: OperationKind::RunInstaller,
            target,
        };

        call.check(|| {
            validate::path("workdir", &req.workdir)?;
            validate::path("installer_script", &req.installer_script)?;
            validate::path("python_bin", &req.python_bin)
        })?;

        let creds = call.acquire(credentials)?;
        let script = call.rendered(scripts::run_installer(req))?;
        self.run_boolean(call, &creds, &script, Vec::new()).await
    }

    /// Render a config template locally and write it with mode 0600
    ///
    /// Placeholders left in the rendered body are reported as warnings on a
    /// successful result, or rejected when `strict_placeholders` is set.
    ///
    /// # Errors
    /// Validation, credential, transport, or non-zero exit of the script
    #[instrument(skip_all, fields(host = %target.host, dest = %req.dest_path))]
    pub async fn prepare_environment(
        &self,
        target: &RemoteTarget,
        credentials: &dyn CredentialProvider,
        req: &PrepareEnvironmentRequest,
    ) -> Result<OperationResult, OperationError> {
        let call = Call {
            operation: OperationKind::PrepareEnvironment,
            target,
        };

        call.check(|| {
            validate::path("workdir", &req.workdir)?;
            validate::relative_destination(&req.dest_path)
        })?;

        let rendered = placeholder::render(&req.template_body, &req.substitutions);
        if self.config.strict_placeholders && !rendered.unreplaced.is_empty() {
            let unreplaced = rendered.unreplaced.clone();
            call.check(|| Err(ValidationError::UnreplacedPlaceholders(unreplaced)))?;
        }

        let warnings: Vec<String> = rendered
            .unreplaced
            .iter()
            .map(|token| format!("unreplaced placeholder {token}"))
            .collect();
        for warning in &warnings {
            warn!(host = %target.host, dest = %req.dest_path, "{warning}");
        }

        let creds = call.acquire(credentials)?;
        let script = call.rendered(scripts::prepare_environment(
            &req.workdir,
            &req.dest_path,
            &rendered.body,
        ))?;
        self.run_boolean(call, &creds, &script, warnings).await
    }

    /// Start a detached process and check it survives the settle interval
    ///
    /// Only validation and credential failures are raised. Transport
    /// failures and a process that did not stay up come back as a result
    /// with `succeeded == false`.
    ///
    /// # Errors
    /// Validation or credential failure
    #[instrument(skip_all, fields(host = %target.host, script = %req.script_path))]
    pub async fn launch(
        &self,
        target: &RemoteTarget,
        credentials: &dyn CredentialProvider,
        req: &LaunchRequest,
    ) -> Result<OperationResult, OperationError> {
        let call = Call {
            operation: OperationKind::Launch,
            target,
        };

        call.check(|| {
            validate::path("workdir", &req.workdir)?;
            validate::path("script_path", &req.script_path)?;
            validate::path("log_path", &req.log_path)?;
            if let Some(interpreter) = &req.interpreter {
                validate::path("interpreter", interpreter)?;
            }
            req.env_vars
                .iter()
                .try_for_each(|(name, _)| validate::env_name(name))
        })?;

        let creds = call.acquire(credentials)?;
        let script = call.rendered(scripts::launch(req, self.config.launch_settings()))?;

        let outcome = self
            .invoke(call, &creds, &script, ExecOptions::capture())
            .await;
        if let Err(e) = &outcome {
            error!(error = %e, "launch transport failed");
        }

        let result = call.outcome().launch(outcome, &req.log_path);
        if result.succeeded {
            info!(
                pid = result.process_id.as_deref().unwrap_or_default(),
                log = %req.log_path,
                "process launched"
            );
        } else {
            warn!(
                error = result.error.as_deref().unwrap_or_default(),
                "process did not stay up"
            );
        }
        Ok(result)
    }

    /// Run a caller-supplied script and return its exit status as data
    ///
    /// A non-zero exit is a result, not an error, so callers can apply their
    /// own pass/fail policy.
    ///
    /// # Errors
    /// Validation, credential or transport failure (including timeout)
    #[instrument(skip_all, fields(host = %target.host, wait = req.wait))]
    pub async fn run_command(
        &self,
        target: &RemoteTarget,
        credentials: &dyn CredentialProvider,
        req: &RunCommandRequest,
    ) -> Result<OperationResult, OperationError> {
        let call = Call {
            operation: OperationKind::RunCommand,
            target,
        };

        call.check(|| {
            if let Some(workdir) = &req.workdir {
                validate::path("workdir", workdir)?;
            }
            if req.script.trim().is_empty() {
                return Err(ValidationError::Empty("script"));
            }
            Ok(())
        })?;

        let creds = call.acquire(credentials)?;
        let script = call.rendered(scripts::run_command(req))?;

        let mut options = ExecOptions::capture();
        if let Some(secs) = req.timeout_seconds {
            options = options.with_timeout(Duration::from_secs(secs));
        }

        let result = self
            .invoke(call, &creds, &script, options)
            .await
            .map_err(|e| {
                error!(error = %e, "run-command transport failed");
                call.transport_error(e)
            })?;

        let result = call.outcome().command(result);
        info!(
            exit_code = result.exit_code.unwrap_or(-1),
            succeeded = result.succeeded,
            "command finished"
        );
        Ok(result)
    }
}
