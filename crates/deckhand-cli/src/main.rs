//! deckhand CLI
//!
//! Runs one deployment operation against one host and reports the result

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use deckhand_exec::{
    ConnectionInfo, CredentialProvider, CredentialRef, EnvCredentials, FileCredentials,
    LocalTransport, RemoteTransport, SshTransport,
};
use deckhand_ops::{OperationExecutor, RemoteTarget};
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod report;

use commands::Cli;
use config::{Config, LogConfig};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let config_path = Config::locate(cli.config.as_deref());
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    init_tracing(&config.log);
    match &config_path {
        Some(path) => debug!(path = %path.display(), "loaded config"),
        None => warn!("no config file found, using defaults"),
    }

    let target = RemoteTarget::new(&cli.host, CredentialRef::new(&cli.credentials))
        .with_port(cli.port.unwrap_or(config.ssh.port));
    let transport = transport_for(&target, &config);
    let credentials = credential_provider(&config);

    let executor = OperationExecutor::new(transport).with_config(config.executor_config());
    let request = cli.command.into_request()?;

    match executor
        .execute(&target, credentials.as_ref(), &request)
        .await
    {
        Ok(result) => report::result(&result, cli.json),
        Err(e) => report::error(&e, cli.json),
    }
}

/// Logs go to stderr; stdout carries results
fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);

    if log.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn transport_for(target: &RemoteTarget, config: &Config) -> Arc<dyn RemoteTransport> {
    if ConnectionInfo::new(&target.host, "").is_local() {
        return Arc::new(LocalTransport::new());
    }

    let mut ssh = SshTransport::new().with_connect_timeout(config.connect_timeout());
    if let Some(key) = &config.ssh.key_path {
        ssh = ssh.with_key_path(key);
    }
    Arc::new(ssh)
}

fn credential_provider(config: &Config) -> Box<dyn CredentialProvider> {
    match &config.credentials.file {
        Some(path) => Box::new(FileCredentials::new(path)),
        None => Box::new(EnvCredentials::new()),
    }
}
