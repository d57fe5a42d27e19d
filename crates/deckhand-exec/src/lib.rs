//! deckhand-exec: Remote transport abstraction
//!
//! Runs rendered scripts on a host, locally or over SSH, and provides the
//! credential provider seam the operation layer acquires secrets through.

pub mod credentials;
pub mod error;
pub mod local;
pub mod result;
pub mod ssh;
pub mod traits;

pub use credentials::{
    CredentialError, CredentialProvider, CredentialRef, Credentials, EnvCredentials,
    FileCredentials, Secret, StaticCredentials,
};
pub use error::ExecError;
pub use local::LocalTransport;
pub use result::{CommandResult, ConnectionInfo, ExecOptions};
pub use ssh::SshTransport;
pub use traits::RemoteTransport;
