//! Input validation
//!
//! Every check here runs before a script is rendered or a connection is
//! opened. Values that cannot be restricted to a safe character class are
//! not validated but quoted (see [`crate::shell::quote`]).

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;

static PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._+][A-Za-z0-9._+-]*$").expect("package name pattern"));

static REPO_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(https?://.+|git@.+)$").expect("repository URL pattern"));

static BRANCH_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._/-]+$").expect("branch name pattern"));

static ENV_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env name pattern"));

const PATH_METACHARACTERS: [char; 3] = [';', '|', '&'];

/// Reject the whole list if any package name is invalid, reporting all of them
///
/// A name may not start with `-`, so it can never be read as an option.
///
/// # Errors
/// `NoPackages` for an empty list, `InvalidPackageNames` listing every offender
pub fn packages(names: &[String]) -> Result<(), ValidationError> {
    if names.is_empty() {
        return Err(ValidationError::NoPackages);
    }

    let invalid: Vec<String> = names
        .iter()
        .filter(|name| !PACKAGE_NAME.is_match(name))
        .cloned()
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::InvalidPackageNames(invalid))
    }
}

/// Working directory, script or program path
///
/// # Errors
/// Empty values, `;` `|` `&`, newlines and NUL are rejected
pub fn path(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if value.contains(PATH_METACHARACTERS) {
        return Err(ValidationError::ShellMetacharacter {
            field,
            value: value.to_string(),
        });
    }
    if value.contains(['\n', '\r', '\0']) {
        return Err(ValidationError::ControlCharacter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Config destination, relative to the working directory
///
/// # Errors
/// Absolute paths and any `..` segment are rejected
pub fn relative_destination(dest: &str) -> Result<(), ValidationError> {
    if dest.starts_with('/') {
        return Err(ValidationError::AbsoluteDestination(dest.to_string()));
    }
    if dest.split('/').any(|segment| segment == "..") {
        return Err(ValidationError::ParentTraversal(dest.to_string()));
    }
    path("dest_path", dest)
}

/// # Errors
/// Anything but `http://`, `https://` or `git@` URLs
pub fn repo_url(url: &str) -> Result<(), ValidationError> {
    if REPO_URL.is_match(url) && !url.contains(['\n', '\0']) {
        Ok(())
    } else {
        Err(ValidationError::InvalidRepoUrl(url.to_string()))
    }
}

/// # Errors
/// Names outside `[A-Za-z0-9._/-]` or starting with `-`
pub fn branch(name: &str) -> Result<(), ValidationError> {
    if BRANCH_NAME.is_match(name) && !name.starts_with('-') {
        Ok(())
    } else {
        Err(ValidationError::InvalidBranch(name.to_string()))
    }
}

/// # Errors
/// Names that are not shell identifiers
pub fn env_name(name: &str) -> Result<(), ValidationError> {
    if ENV_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEnvName(name.to_string()))
    }
}

/// Directory a clean clone may delete
///
/// # Errors
/// The filesystem root in any spelling (`/`, `//`, `/./`)
pub fn removable_dir(dir: &str) -> Result<(), ValidationError> {
    let is_root = dir.starts_with('/') && dir.split('/').all(|s| s.is_empty() || s == ".");
    if is_root {
        Err(ValidationError::RefusedRemoval(dir.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_valid_packages() {
        assert!(packages(&names(&["curl", "python3.11-venv", "g++", "libssl_dev"])).is_ok());
    }

    #[test]
    fn test_invalid_packages_reports_all_offenders() {
        let err = packages(&names(&["curl", "git;id", "vim", "$(reboot)", ""])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidPackageNames(names(&["git;id", "$(reboot)", ""]))
        );
    }

    #[test]
    fn test_package_names_cannot_be_options() {
        let err = packages(&names(&["curl", "--allow-unauthenticated", "--nogpgcheck", "-y"]))
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidPackageNames(names(&[
                "--allow-unauthenticated",
                "--nogpgcheck",
                "-y"
            ]))
        );
        assert!(packages(&names(&["libc6-dev", "c++-tools"])).is_ok());
    }

    #[test]
    fn test_empty_package_list() {
        assert_eq!(packages(&[]), Err(ValidationError::NoPackages));
    }

    #[test]
    fn test_path_metacharacters() {
        assert!(path("workdir", "/opt/my app").is_ok());
        for bad in ["/opt/app;id", "/opt/a|b", "/opt/a&b"] {
            assert!(matches!(
                path("workdir", bad),
                Err(ValidationError::ShellMetacharacter { field: "workdir", .. })
            ));
        }
        assert_eq!(path("workdir", ""), Err(ValidationError::Empty("workdir")));
        assert!(matches!(
            path("workdir", "/opt/a\nid"),
            Err(ValidationError::ControlCharacter { .. })
        ));
    }

    #[test]
    fn test_relative_destination() {
        assert!(relative_destination("config/app.env").is_ok());
        assert!(relative_destination(".env").is_ok());
        assert!(relative_destination("a..b/c").is_ok());
        assert!(matches!(
            relative_destination("/etc/passwd"),
            Err(ValidationError::AbsoluteDestination(_))
        ));
        for bad in ["../x", "config/../../x", "a/.."] {
            assert!(matches!(
                relative_destination(bad),
                Err(ValidationError::ParentTraversal(_))
            ));
        }
    }

    #[test]
    fn test_repo_url() {
        for ok in [
            "https://example.com/r.git",
            "http://git.local/r",
            "git@github.com:org/repo.git",
        ] {
            assert!(repo_url(ok).is_ok(), "{ok}");
        }
        for bad in ["ftp://x/r.git", "/srv/repo.git", "https://", "file:///tmp/r", ""] {
            assert!(repo_url(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_branch() {
        assert!(branch("main").is_ok());
        assert!(branch("release/1.2").is_ok());
        assert!(branch("--upload-pack=x").is_err());
        assert!(branch("main;id").is_err());
        assert!(branch("").is_err());
    }

    #[test]
    fn test_env_name() {
        assert!(env_name("APP_PORT").is_ok());
        assert!(env_name("_x1").is_ok());
        assert!(env_name("1X").is_err());
        assert!(env_name("A B").is_err());
        assert!(env_name("PATH=/tmp").is_err());
    }

    #[test]
    fn test_removable_dir() {
        assert!(removable_dir("/opt/app").is_ok());
        for root in ["/", "//", "/./"] {
            assert!(removable_dir(root).is_err(), "{root}");
        }
    }

    proptest! {
        #[test]
        fn prop_package_list_with_bad_name_fails(
            good in proptest::collection::vec("[A-Za-z0-9._+][A-Za-z0-9._+-]{0,11}", 0..5),
            bad in "[a-z]{0,4}[;$ `|&*(){}]{1,3}[a-z]{0,4}",
        ) {
            let mut list = good.clone();
            list.push(bad.clone());
            let result = packages(&list);
            prop_assert_eq!(result, Err(ValidationError::InvalidPackageNames(vec![bad])));
        }

        #[test]
        fn prop_traversal_always_rejected(
            prefix in "[a-z]{0,6}(/[a-z]{1,6}){0,2}",
            suffix in "(/[a-z]{1,6}){0,2}",
        ) {
            let dest = if prefix.is_empty() {
                format!("..{suffix}")
            } else {
                format!("{prefix}/..{suffix}")
            };
            prop_assert!(relative_destination(&dest).is_err());
            let absolute = format!("/{prefix}");
            prop_assert!(relative_destination(&absolute).is_err());
        }
    }
}
