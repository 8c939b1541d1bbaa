//! Executing a compiled argument list.
//!
//! The compiler never runs anything itself; a [`Runner`] is handed the
//! binary and the argument list. [`ProcessRunner`] spawns the process
//! directly, without a shell, so arguments are passed exactly as emitted.

use crate::error::{FfgraphError, Result, ResultExt};
use serde::Serialize;
use std::process::Command;

/// Captured result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into an error carrying the tail of stderr.
    pub fn into_result(self) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        let tail: Vec<&str> = self.stderr.lines().rev().take(5).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        Err(FfgraphError::Process(format!(
            "exited with {}: {}",
            self.exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            tail.join("\n")
        )))
    }
}

/// Executes an argument list against a binary.
#[cfg_attr(test, mockall::automock)]
pub trait Runner {
    fn run(&self, binary: &str, args: &[String]) -> Result<RunOutput>;
}

/// Runs the binary as a child process and waits for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl Runner for ProcessRunner {
    fn run(&self, binary: &str, args: &[String]) -> Result<RunOutput> {
        tracing::info!("Running {} with {} arguments", binary, args.len());
        tracing::trace!("{} {:?}", binary, args);

        let output = Command::new(binary)
            .args(args)
            .output()
            .with_context(|| format!("Failed to spawn {}", binary))?;

        let result = RunOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success() {
            tracing::warn!("{} exited with {:?}", binary, result.exit_code);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        let ok = RunOutput {
            exit_code: Some(0),
            ..Default::default()
        };
        assert!(ok.into_result().is_ok());

        let failed = RunOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "line 1\nNo such file or directory\n".to_string(),
        };
        let err = failed.into_result().unwrap_err();
        assert!(err.to_string().contains("exited with 1"));
        assert!(err.to_string().contains("No such file"));
    }

    #[test]
    fn test_missing_binary_is_io_error() {
        let err = ProcessRunner
            .run("ffgraph-rs-definitely-not-a-binary", &[])
            .unwrap_err();
        assert!(matches!(err.root_cause(), FfgraphError::Io(_)));
    }
}
