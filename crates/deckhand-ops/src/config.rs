//! Executor configuration

use serde::{Deserialize, Serialize};

use crate::scripts::LaunchSettings;

/// Settings that apply to every call made through one executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Seconds to wait after starting a process before checking it is alive
    ///
    /// This is a heuristic, not a readiness probe: an application that dies
    /// later, or takes longer to fail, is still reported as launched.
    #[serde(default = "default_settle_seconds")]
    pub launch_settle_seconds: u64,
    /// Log lines returned when a launched process died
    #[serde(default = "default_log_tail_lines")]
    pub launch_log_tail_lines: u32,
    /// Treat unreplaced placeholders as a validation failure
    #[serde(default)]
    pub strict_placeholders: bool,
}

fn default_settle_seconds() -> u64 {
    3
}

fn default_log_tail_lines() -> u32 {
    50
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            launch_settle_seconds: default_settle_seconds(),
            launch_log_tail_lines: default_log_tail_lines(),
            strict_placeholders: false,
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            settle_seconds: self.launch_settle_seconds,
            log_tail_lines: self.launch_log_tail_lines,
        }
    }
}
