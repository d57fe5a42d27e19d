//! Remote transport trait

use async_trait::async_trait;

use crate::credentials::Secret;
use crate::error::ExecError;
use crate::result::{CommandResult, ConnectionInfo, ExecOptions};

/// Runs one fully rendered script on a host
///
/// Implementations deliver `script` to a remote `bash -s` over stdin and
/// report its exit status. A non-zero exit status is returned as data; only
/// transport-level failures produce an [`ExecError`].
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn execute(
        &self,
        conn: &ConnectionInfo,
        secret: &Secret,
        script: &str,
        options: ExecOptions,
    ) -> Result<CommandResult, ExecError>;

    fn transport_type(&self) -> &'static str;
}
