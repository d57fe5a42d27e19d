//! Turning transport results into [`OperationResult`]s

use std::time::Duration;

use chrono::Utc;
use deckhand_exec::{CommandResult, ExecError};

use crate::error::OperationError;
use crate::types::{CommitInfo, OperationKind, OperationResult};


const CLONE_COMMIT: &str = "CLONE_COMMIT:";
const CLONE_SUBJECT: &str = "CLONE_SUBJECT:";
const BACKGROUND_PID: &str = "BACKGROUND_PID:";
const LAUNCH_SUCCESS: &str = "LAUNCH_SUCCESS:";
const LAUNCH_FAILED: &str = "LAUNCH_FAILED";

/// Which operation ran where
#[derive(Debug, Clone, Copy)]
pub struct Outcome<'a> {
    pub operation: OperationKind,
    pub host: &'a str,
}

impl Outcome<'_> {
    fn result(&self, succeeded: bool, duration: Duration) -> OperationResult {
        OperationResult {
            operation: self.operation,
            host: self.host.to_string(),
            succeeded,
            exit_code: None,
            output: None,
            process_id: None,
            error: None,
            warnings: Vec::new(),
            log_path: None,
            commit: None,
            duration,
            completed_at: Utc::now(),
        }
    }

    /// Clone, install, run-installer and prepare-environment
    ///
    /// # Errors
    /// `RemoteFailed` with the exit status when the script exited non-zero
    pub fn boolean(
        &self,
        result: CommandResult,
        warnings: Vec<String>,
    ) -> Result<OperationResult, OperationError> {
        if !result.success() {
            return Err(OperationError::RemoteFailed {
                operation: self.operation,
                host: self.host.to_string(),
                status: result.status,
                detail: failure_detail(&result),
            });
        }

        let commit = match self.operation {
            OperationKind::Clone => parse_commit(result.stdout()),
            _ => None,
        };

        Ok(OperationResult {
            exit_code: Some(result.status),
            warnings,
            commit,
            output: result.output,
            ..self.result(true, result.duration)
        })
    }

    /// Launch never raises past validation; failures become a failed result
    #[must_use]
    pub fn launch(
        &self,
        outcome: Result<CommandResult, ExecError>,
        log_path: &str,
    ) -> OperationResult {
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                return OperationResult {
                    error: Some(e.to_string()),
                    log_path: Some(log_path.to_string()),
                    ..self.result(false, Duration::ZERO)
                };
            }
        };

        let pid = launch_pid(result.stdout()).map(str::to_string);

        match pid {
            Some(pid) => OperationResult {
                exit_code: Some(result.status),
                process_id: Some(pid),
                log_path: Some(log_path.to_string()),
                output: result.output,
                ..self.result(true, result.duration)
            },
            None => OperationResult {
                exit_code: Some(result.status),
                error: Some(result.combined_output()),
                log_path: Some(log_path.to_string()),
                output: result.output,
                ..self.result(false, result.duration)
            },
        }
    }

    /// Run-command returns exit status and output verbatim
    #[must_use]
    pub fn command(&self, result: CommandResult) -> OperationResult {
        let process_id = find_marker(result.stdout(), BACKGROUND_PID).map(str::to_string);
        let error = (!result.success() && !result.stderr.is_empty()).then(|| result.stderr.clone());

        OperationResult {
            exit_code: Some(result.status),
            process_id,
            error,
            output: result.output,
            ..self.result(result.status == 0, result.duration)
        }
    }
}

/// Text after `marker` on the first line that starts with it
fn find_marker<'a>(output: &'a str, marker: &str) -> Option<&'a str> {
    output
        .lines()
        .find_map(|line| line.strip_prefix(marker))
        .map(str::trim)
}

/// Pid from the first launch verdict line; `None` if that verdict is a failure
fn launch_pid(output: &str) -> Option<&str> {
    let verdict = output
        .lines()
        .map(str::trim_end)
        .find(|line| *line == LAUNCH_FAILED || line.starts_with(LAUNCH_SUCCESS))?;
    let pid = verdict.strip_prefix(LAUNCH_SUCCESS)?;
    (!pid.is_empty() && pid.bytes().all(|b| b.is_ascii_digit())).then_some(pid)
}

fn parse_commit(output: &str) -> Option<CommitInfo> {
    let hash = find_marker(output, CLONE_COMMIT)?;
    let subject = find_marker(output, CLONE_SUBJECT).unwrap_or_default();
    Some(CommitInfo {
        hash: hash.to_string(),
        subject: subject.to_string(),
    })
}

/// stderr if there is any, otherwise stdout, trimmed
fn failure_detail(result: &CommandResult) -> String {
    let stderr = result.stderr.trim();
    if stderr.is_empty() {
        result.stdout().trim().to_string()
    } else {
        stderr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: i32, stdout: &str, stderr: &str) -> CommandResult {
        CommandResult {
            status,
            output: Some(stdout.to_string()),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(5),
        }
    }

    fn outcome(operation: OperationKind) -> Outcome<'static> {
        Outcome {
            operation,
            host: "app01",
        }
    }

    #[test]
    fn test_boolean_success() {
        let result = outcome(OperationKind::RunInstaller)
            .boolean(raw(0, "done\n", ""), Vec::new())
            .unwrap();

        assert!(result.succeeded);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.output.as_deref(), Some("done\n"));
        assert_eq!(result.host, "app01");
    }

    #[test]
    fn test_boolean_failure_raises_with_status() {
        let err = outcome(OperationKind::RunInstaller)
            .boolean(raw(3, "", "ModuleNotFoundError: yaml\n"), Vec::new())
            .unwrap_err();

        match err {
            OperationError::RemoteFailed {
                operation,
                host,
                status,
                detail,
            } => {
                assert_eq!(operation, OperationKind::RunInstaller);
                assert_eq!(host, "app01");
                assert_eq!(status, 3);
                assert_eq!(detail, "ModuleNotFoundError: yaml");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_clone_commit_parsed() {
        let stdout = "CLONE_COMMIT:3f2a9c1d\nCLONE_SUBJECT:Fix config loader\n";
        let result = outcome(OperationKind::Clone)
            .boolean(raw(0, stdout, ""), Vec::new())
            .unwrap();

        assert_eq!(
            result.commit,
            Some(CommitInfo {
                hash: "3f2a9c1d".to_string(),
                subject: "Fix config loader".to_string(),
            })
        );
    }

    #[test]
    fn test_warnings_carried() {
        let result = outcome(OperationKind::PrepareEnvironment)
            .boolean(raw(0, "", ""), vec!["{{B}}".to_string()])
            .unwrap();
        assert_eq!(result.warnings, vec!["{{B}}".to_string()]);
    }

    #[test]
    fn test_launch_success() {
        let result = outcome(OperationKind::Launch)
            .launch(Ok(raw(0, "LAUNCH_SUCCESS:4821\n", "")), "/var/log/app.log");

        assert!(result.succeeded);
        assert_eq!(result.process_id.as_deref(), Some("4821"));
        assert_eq!(result.log_path.as_deref(), Some("/var/log/app.log"));
        assert_eq!(result.error, None);
    }

    #[test]
    fn test_launch_without_marker_fails() {
        let output = "LAUNCH_FAILED\nTraceback (most recent call last):\nImportError\n";
        let result = outcome(OperationKind::Launch).launch(Ok(raw(1, output, "")), "app.log");

        assert!(!result.succeeded);
        assert_eq!(result.process_id, None);
        assert_eq!(result.error.as_deref(), Some(output));
    }

    #[test]
    fn test_launch_verdict_must_start_a_line() {
        for output in [
            "app says LAUNCH_SUCCESS:5\nLAUNCH_FAILED\n",
            "echo LAUNCH_SUCCESS:77\n",
            "LAUNCH_FAILED\nLAUNCH_SUCCESS:12\n",
            "LAUNCH_SUCCESS:12abc\n",
            "LAUNCH_SUCCESS:\n",
        ] {
            let result = outcome(OperationKind::Launch).launch(Ok(raw(0, output, "")), "app.log");
            assert!(!result.succeeded, "{output:?}");
            assert_eq!(result.process_id, None);
        }

        let result = outcome(OperationKind::Launch)
            .launch(Ok(raw(0, "starting\nLAUNCH_SUCCESS:903\n", "")), "app.log");
        assert_eq!(result.process_id.as_deref(), Some("903"));
    }

    #[test]
    fn test_launch_transport_error_is_value() {
        let result = outcome(OperationKind::Launch).launch(
            Err(ExecError::ConnectionFailed("no route to host".to_string())),
            "app.log",
        );

        assert!(!result.succeeded);
        assert_eq!(result.exit_code, None);
        assert!(result.error.unwrap().contains("no route to host"));
    }

    #[test]
    fn test_command_nonzero_is_data() {
        let result = outcome(OperationKind::RunCommand).command(raw(1, "AssertionError", ""));

        assert!(!result.succeeded);
        assert_eq!(result.exit_code, Some(1));
        assert_eq!(result.output.as_deref(), Some("AssertionError"));
        assert_eq!(result.error, None);
    }

    #[test]
    fn test_command_background_pid() {
        let result = outcome(OperationKind::RunCommand).command(raw(0, "BACKGROUND_PID:991\n", ""));

        assert!(result.succeeded);
        assert_eq!(result.process_id.as_deref(), Some("991"));
    }

    #[test]
    fn test_find_marker_requires_line_start() {
        assert_eq!(find_marker("x CLONE_COMMIT:abc\n", CLONE_COMMIT), None);
        assert_eq!(find_marker("CLONE_COMMIT: abc \n", CLONE_COMMIT), Some("abc"));
    }
}
