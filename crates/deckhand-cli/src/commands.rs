//! Command-line surface and its mapping onto operation requests

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use deckhand_ops::{
    CloneRequest, InstallDependenciesRequest, LaunchRequest, OperationRequest, PackageManagerKind,
    PrepareEnvironmentRequest, RunCommandRequest, RunInstallerRequest, Substitutions,
};

#[derive(Parser, Debug)]
#[command(name = "deckhand")]
#[command(about = "Run deployment operations on a remote host over SSH", long_about = None)]
pub struct Cli {
    /// Target host; localhost runs through a local shell
    #[arg(long, global = true, env = "DECKHAND_HOST", default_value = "localhost")]
    pub host: String,

    /// SSH port (defaults to the configured port)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Credential reference, e.g. `deploy` reads DEPLOY_USER / DEPLOY_PASSWORD
    #[arg(
        long,
        global = true,
        env = "DECKHAND_CREDENTIALS",
        default_value = "deckhand"
    )]
    pub credentials: String,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clone a repository, or fast-forward an existing checkout
    Clone {
        #[arg(long)]
        workdir: String,
        #[arg(long)]
        repo: String,
        #[arg(long, default_value = "main")]
        branch: String,
        /// Remove the working directory first
        #[arg(long)]
        clean: bool,
    },

    /// Install system packages that are missing
    Install {
        #[arg(required = true)]
        packages: Vec<String>,
        /// auto, apt, dnf or yum
        #[arg(long, default_value = "auto")]
        manager: PackageManagerKind,
    },

    /// Run a Python installer script
    RunInstaller {
        #[arg(long)]
        workdir: String,
        installer: String,
        #[arg(long, default_value = "python3")]
        python: String,
        /// Arguments passed to the installer, after `--`
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Render a local config template and write it on the host
    PrepareEnv {
        #[arg(long)]
        workdir: String,
        /// Local template file
        #[arg(long)]
        template: PathBuf,
        /// Destination relative to the working directory
        #[arg(long)]
        dest: String,
        /// Literal substitution, e.g. `--set '{{DB_HOST}}=db01'`
        #[arg(long = "set", value_parser = parse_pair)]
        substitutions: Vec<(String, String)>,
    },

    /// Start a script detached and check it stays up
    Launch {
        #[arg(long)]
        workdir: String,
        script: String,
        /// Log file, relative to the working directory or absolute
        #[arg(long)]
        log: String,
        /// Environment variable, `NAME=value`
        #[arg(long = "env", value_parser = parse_pair)]
        env_vars: Vec<(String, String)>,
        #[arg(long)]
        interpreter: Option<String>,
        /// Arguments passed to the script, after `--`
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Run a shell script on the host; `-` reads it from stdin
    Run {
        script: String,
        #[arg(long)]
        workdir: Option<String>,
        /// Start in the background and return at once
        #[arg(long)]
        detach: bool,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

impl Commands {
    /// Build the request, reading any local input files
    ///
    /// # Errors
    /// Returns error if a template or stdin cannot be read
    pub fn into_request(self) -> eyre::Result<OperationRequest> {
        let request = match self {
            Commands::Clone {
                workdir,
                repo,
                branch,
                clean,
            } => OperationRequest::Clone(CloneRequest {
                workdir,
                repo_url: repo,
                branch,
                clean_clone: clean,
            }),
            Commands::Install { packages, manager } => {
                OperationRequest::InstallDependencies(InstallDependenciesRequest {
                    packages,
                    package_manager: manager,
                })
            }
            Commands::RunInstaller {
                workdir,
                installer,
                python,
                args,
            } => OperationRequest::RunInstaller(RunInstallerRequest {
                workdir,
                installer_script: installer,
                python_bin: python,
                extra_args: args,
            }),
            Commands::PrepareEnv {
                workdir,
                template,
                dest,
                substitutions,
            } => {
                let template_body = std::fs::read_to_string(&template)
                    .map_err(|e| eyre::eyre!("cannot read template {}: {e}", template.display()))?;
                OperationRequest::PrepareEnvironment(PrepareEnvironmentRequest {
                    workdir,
                    template_body,
                    dest_path: dest,
                    substitutions: substitutions.into_iter().collect::<Substitutions>(),
                })
            }
            Commands::Launch {
                workdir,
                script,
                log,
                env_vars,
                interpreter,
                args,
            } => OperationRequest::Launch(LaunchRequest {
                workdir,
                script_path: script,
                env_vars,
                args,
                interpreter,
                log_path: log,
            }),
            Commands::Run {
                script,
                workdir,
                detach,
                timeout,
            } => {
                let script = if script == "-" {
                    let mut body = String::new();
                    std::io::stdin().read_to_string(&mut body)?;
                    body
                } else {
                    script
                };
                OperationRequest::RunCommand(RunCommandRequest {
                    workdir,
                    script,
                    wait: !detach,
                    timeout_seconds: timeout,
                })
            }
        };
        Ok(request)
    }
}

/// Split `KEY=value` on the first `=`
fn parse_pair(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty key in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("deckhand").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(
            parse_pair("{{DB_URL}}=postgres://db/app?x=1"),
            Ok(("{{DB_URL}}".to_string(), "postgres://db/app?x=1".to_string()))
        );
        assert!(parse_pair("novalue").is_err());
        assert!(parse_pair("=x").is_err());
    }

    #[test]
    fn test_install_command() {
        let cli = parse(&["--host", "app01", "install", "git", "curl", "--manager", "dnf"]);
        assert_eq!(cli.host, "app01");

        let OperationRequest::InstallDependencies(req) = cli.command.into_request().unwrap() else {
            panic!("expected install request");
        };
        assert_eq!(req.packages, vec!["git", "curl"]);
        assert_eq!(req.package_manager, PackageManagerKind::Dnf);
    }

    #[test]
    fn test_install_requires_packages() {
        assert!(Cli::try_parse_from(["deckhand", "install"]).is_err());
    }

    #[test]
    fn test_launch_command() {
        let cli = parse(&[
            "launch",
            "--workdir",
            "/opt/app",
            "server.py",
            "--log",
            "logs/server.log",
            "--env",
            "APP_ENV=prod",
            "--interpreter",
            "python3",
            "--",
            "--port",
            "8080",
        ]);

        let OperationRequest::Launch(req) = cli.command.into_request().unwrap() else {
            panic!("expected launch request");
        };
        assert_eq!(req.script_path, "server.py");
        assert_eq!(req.env_vars, vec![("APP_ENV".to_string(), "prod".to_string())]);
        assert_eq!(req.args, vec!["--port", "8080"]);
        assert_eq!(req.interpreter.as_deref(), Some("python3"));
    }

    #[test]
    fn test_prepare_env_reads_template() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("env.tmpl");
        std::fs::write(&template, "DB={{DB}}\n").unwrap();
        let template = template.to_string_lossy().into_owned();

        let cli = parse(&[
            "prepare-env",
            "--workdir",
            "/opt/app",
            "--template",
            &template,
            "--dest",
            ".env",
            "--set",
            "{{DB}}=db01",
        ]);

        let OperationRequest::PrepareEnvironment(req) = cli.command.into_request().unwrap() else {
            panic!("expected prepare-environment request");
        };
        assert_eq!(req.template_body, "DB={{DB}}\n");
        assert_eq!(req.substitutions, Substitutions::new().with("{{DB}}", "db01"));
    }

    #[test]
    fn test_run_detach() {
        let cli = parse(&["run", "sleep 60", "--detach", "--timeout", "5", "--json"]);
        assert!(cli.json);

        let OperationRequest::RunCommand(req) = cli.command.into_request().unwrap() else {
            panic!("expected run-command request");
        };
        assert!(!req.wait);
        assert_eq!(req.timeout_seconds, Some(5));
        assert_eq!(req.workdir, None);
    }
}
