//! Credential acquisition
//!
//! Credentials are looked up per call through a [`CredentialProvider`] and
//! dropped when the call returns. Nothing here caches a secret.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

const MASK: &str = "********";

/// Opaque handle naming a credential pair
///
/// The provider decides what the name means (an environment prefix, a table
/// in a credentials file, a key in a fixture map).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialRef(String);

impl CredentialRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A secret string that never prints its value
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value
    ///
    /// Only the transport and the script templater should call this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every occurrence of the secret in `text` with a mask
    #[must_use]
    pub fn mask(&self, text: &str) -> String {
        if self.0.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.0, MASK)
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({MASK})")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

/// Username and secret scoped to one call
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub secret: Secret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: Secret::new(secret),
        }
    }
}

/// Credential lookup errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("environment variable {0} not set")]
    EnvNotSet(String),

    #[error("no credentials named {0}")]
    UnknownReference(String),

    #[error("credentials file permissions too open: {0} (should be 600)")]
    BadPermissions(String),

    #[error("credentials file not found: {0}")]
    NotFound(String),

    #[error("invalid credentials file: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Yields credentials for a reference
pub trait CredentialProvider: Send + Sync {
    /// Look up the credential pair for `reference`
    ///
    /// # Errors
    /// Returns `CredentialError` if the reference cannot be resolved
    fn acquire(&self, reference: &CredentialRef) -> Result<Credentials, CredentialError>;
}

/// Reads `<REF>_USER` and `<REF>_PASSWORD` from the process environment
///
/// This is the shape pipeline secret bindings expose credentials in.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn var_names(reference: &CredentialRef) -> (String, String) {
        let prefix = reference.name().to_ascii_uppercase().replace('-', "_");
        (format!("{prefix}_USER"), format!("{prefix}_PASSWORD"))
    }
}

impl CredentialProvider for EnvCredentials {
    fn acquire(&self, reference: &CredentialRef) -> Result<Credentials, CredentialError> {
        let (user_var, secret_var) = Self::var_names(reference);
        let username = env::var(&user_var).map_err(|_| CredentialError::EnvNotSet(user_var))?;
        let secret = env::var(&secret_var).map_err(|_| CredentialError::EnvNotSet(secret_var))?;

        debug!(reference = %reference, user = %username, "credentials read from environment");

        Ok(Credentials::new(username, secret))
    }
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    user: String,
    password: String,
}

/// Reads credentials from a TOML file of `[name]` tables
///
/// ```toml
/// [deploy]
/// user = "deploy"
/// password = "..."
/// ```
///
/// The file must not be readable by group or others.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Result<HashMap<String, FileEntry>, CredentialError> {
        if !self.path.exists() {
            return Err(CredentialError::NotFound(self.path.display().to_string()));
        }
        validate_file_permissions(&self.path)?;

        let content = std::fs::read_to_string(&self.path)?;
        toml::from_str(&content).map_err(|e| CredentialError::Parse(e.to_string()))
    }
}

impl CredentialProvider for FileCredentials {
    fn acquire(&self, reference: &CredentialRef) -> Result<Credentials, CredentialError> {
        let mut entries = self.load()?;
        let entry = entries
            .remove(reference.name())
            .ok_or_else(|| CredentialError::UnknownReference(reference.to_string()))?;

        debug!(reference = %reference, path = %self.path.display(), "credentials read from file");

        Ok(Credentials::new(entry.user, entry.password))
    }
}

/// Fixed in-memory credentials
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, credentials: Credentials) -> Self {
        self.entries.insert(name.into(), credentials);
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn acquire(&self, reference: &CredentialRef) -> Result<Credentials, CredentialError> {
        self.entries
            .get(reference.name())
            .cloned()
            .ok_or_else(|| CredentialError::UnknownReference(reference.to_string()))
    }
}

fn validate_file_permissions(path: &Path) -> Result<(), CredentialError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode();

    // group and other bits must be clear
    if mode & 0o77 != 0 {
        return Err(CredentialError::BadPermissions(path.display().to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    #[test]
    fn test_secret_never_prints() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret}"), MASK);
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_secret_mask() {
        let secret = Secret::new("hunter2");
        assert_eq!(
            secret.mask("sudo: hunter2 is wrong, hunter2"),
            "sudo: ******** is wrong, ********"
        );
        assert_eq!(Secret::default().mask("unchanged"), "unchanged");
    }

    #[test]
    fn test_env_var_names() {
        let (user, password) = EnvCredentials::var_names(&CredentialRef::new("app-deploy"));
        assert_eq!(user, "APP_DEPLOY_USER");
        assert_eq!(password, "APP_DEPLOY_PASSWORD");
    }

    #[test]
    fn test_env_missing_var() {
        let result = EnvCredentials::new().acquire(&CredentialRef::new("deckhand_test_unset_ref"));
        assert!(matches!(result, Err(CredentialError::EnvNotSet(name)) if name == "DECKHAND_TEST_UNSET_REF_USER"));
    }

    #[test]
    fn test_static_credentials() {
        let provider =
            StaticCredentials::new().with("deploy", Credentials::new("deploy", "s3cret"));

        let creds = provider.acquire(&CredentialRef::new("deploy")).unwrap();
        assert_eq!(creds.username, "deploy");
        assert_eq!(creds.secret.expose(), "s3cret");

        assert!(matches!(
            provider.acquire(&CredentialRef::new("other")),
            Err(CredentialError::UnknownReference(_))
        ));
    }

    fn write_credentials(mode: u32) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[deploy]\nuser = \"deploy\"\npassword = \"it's secret\"").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(mode)).unwrap();
        file
    }

    #[test]
    fn test_file_credentials() {
        let file = write_credentials(0o600);
        let provider = FileCredentials::new(file.path());

        let creds = provider.acquire(&CredentialRef::new("deploy")).unwrap();
        assert_eq!(creds.username, "deploy");
        assert_eq!(creds.secret.expose(), "it's secret");
    }

    #[test]
    fn test_file_credentials_rejects_open_permissions() {
        let file = write_credentials(0o644);
        let result = FileCredentials::new(file.path()).acquire(&CredentialRef::new("deploy"));
        assert!(matches!(result, Err(CredentialError::BadPermissions(_))));
    }

    #[test]
    fn test_file_credentials_missing() {
        let result = FileCredentials::new("/nonexistent/deckhand/credentials.toml")
            .acquire(&CredentialRef::new("deploy"));
        assert!(matches!(result, Err(CredentialError::NotFound(_))));
    }
}
