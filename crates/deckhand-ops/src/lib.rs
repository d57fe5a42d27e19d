//! deckhand-ops: Remote deployment operations
//!
//! A fixed catalogue of operations (clone, install-dependencies,
//! run-installer, prepare-environment, launch, run-command), each validated,
//! rendered into a shell script, run once through a
//! [`RemoteTransport`](deckhand_exec::RemoteTransport) and interpreted into an
//! [`OperationResult`].

pub mod config;
pub mod error;
pub mod executor;
pub mod interpret;
pub mod placeholder;
pub mod request;
pub mod scripts;
pub mod shell;
pub mod types;
pub mod validate;

pub use config::ExecutorConfig;
pub use error::{OperationError, TemplateError, ValidationError};
pub use executor::OperationExecutor;
pub use request::{
    CloneRequest, InstallDependenciesRequest, LaunchRequest, OperationRequest,
    PrepareEnvironmentRequest, RunCommandRequest, RunInstallerRequest,
};
pub use types::{
    CommitInfo, OperationKind, OperationResult, PackageManagerKind, RemoteTarget, Substitutions,
};
