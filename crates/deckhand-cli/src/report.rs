//! Printing results and choosing the process exit code

use std::fmt::Write as _;
use std::process::ExitCode;

use deckhand_ops::{OperationError, OperationKind, OperationResult};
use serde_json::json;

/// Exit code for a completed operation
///
/// run-command passes the remote status through; everything else is 0 on
/// success and 1 otherwise.
#[must_use]
pub fn result_code(result: &OperationResult) -> u8 {
    match (result.operation, result.exit_code) {
        (OperationKind::RunCommand, Some(code)) => u8::try_from(code).unwrap_or(1),
        _ if result.succeeded => 0,
        _ => 1,
    }
}

/// Exit code for an operation that raised
#[must_use]
pub fn error_code(error: &OperationError) -> u8 {
    if error.is_validation() { 2 } else { 1 }
}

/// Human-readable rendering of a result
#[must_use]
pub fn render(result: &OperationResult) -> String {
    let mut out = String::new();

    if result.operation == OperationKind::RunCommand {
        if let Some(output) = &result.output {
            out.push_str(output);
        }
        return out;
    }

    let status = if result.succeeded { "ok" } else { "failed" };
    let _ = writeln!(
        out,
        "{} on {}: {status} ({:.1}s)",
        result.operation,
        result.host,
        result.duration.as_secs_f64()
    );
    if let Some(commit) = &result.commit {
        let _ = writeln!(out, "commit {} {}", commit.hash, commit.subject);
    }
    if let Some(pid) = &result.process_id {
        let _ = writeln!(out, "pid {pid}");
    }
    if let Some(log) = &result.log_path {
        let _ = writeln!(out, "log {log}");
    }
    for warning in &result.warnings {
        let _ = writeln!(out, "warning: {warning}");
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "{error}");
    }
    out
}

/// Print a result and return the exit code
pub fn result(result: &OperationResult, as_json: bool) -> eyre::Result<ExitCode> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        print!("{}", render(result));
        if result.operation == OperationKind::RunCommand
            && let Some(error) = &result.error
        {
            eprint!("{error}");
        }
    }
    Ok(ExitCode::from(result_code(result)))
}

/// Print an error and return the exit code
pub fn error(error: &OperationError, as_json: bool) -> eyre::Result<ExitCode> {
    if as_json {
        let body = json!({
            "operation": error.operation(),
            "succeeded": false,
            "exit_code": error.exit_status(),
            "error": error.to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        eprintln!("error: {error}");
    }
    Ok(ExitCode::from(error_code(error)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use deckhand_ops::{CommitInfo, ValidationError};

    use super::*;

    fn sample(operation: OperationKind, succeeded: bool, exit_code: Option<i32>) -> OperationResult {
        OperationResult {
            operation,
            host: "app01".to_string(),
            succeeded,
            exit_code,
            output: None,
            process_id: None,
            error: None,
            warnings: Vec::new(),
            log_path: None,
            commit: None,
            duration: Duration::from_millis(1500),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_run_command_passes_status_through() {
        assert_eq!(result_code(&sample(OperationKind::RunCommand, false, Some(3))), 3);
        assert_eq!(result_code(&sample(OperationKind::RunCommand, true, Some(0))), 0);
        assert_eq!(result_code(&sample(OperationKind::RunCommand, false, Some(-1))), 1);
    }

    #[test]
    fn test_launch_failure_exits_one() {
        assert_eq!(result_code(&sample(OperationKind::Launch, false, Some(1))), 1);
        assert_eq!(result_code(&sample(OperationKind::Launch, false, None)), 1);
        assert_eq!(result_code(&sample(OperationKind::Launch, true, Some(0))), 0);
    }

    #[test]
    fn test_validation_exits_two() {
        let err = OperationError::Validation {
            operation: OperationKind::Clone,
            host: "app01".to_string(),
            reason: ValidationError::InvalidBranch("-x".to_string()),
        };
        assert_eq!(error_code(&err), 2);

        let err = OperationError::RemoteFailed {
            operation: OperationKind::Clone,
            host: "app01".to_string(),
            status: 128,
            detail: "fatal: repository not found".to_string(),
        };
        assert_eq!(error_code(&err), 1);
    }

    #[test]
    fn test_render_clone() {
        let mut clone = sample(OperationKind::Clone, true, Some(0));
        clone.commit = Some(CommitInfo {
            hash: "3f2a9c1d".to_string(),
            subject: "Fix config loader".to_string(),
        });

        let text = render(&clone);
        assert!(text.starts_with("clone on app01: ok (1.5s)\n"));
        assert!(text.contains("commit 3f2a9c1d Fix config loader\n"));
    }

    #[test]
    fn test_render_run_command_is_raw_output() {
        let mut run = sample(OperationKind::RunCommand, false, Some(1));
        run.output = Some("AssertionError".to_string());
        assert_eq!(render(&run), "AssertionError");
    }
}
