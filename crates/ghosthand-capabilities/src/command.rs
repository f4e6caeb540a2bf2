//! External command execution.
//!
//! Desktop, OCR and redaction executors drive command-line tools. They go
//! through `CommandRunner` so deployments can swap the tools and tests can
//! record invocations instead of running them.

use std::process::Command;

use tracing::debug;

use ghosthand_contracts::error::{GhosthandError, GhosthandResult};

/// Captured result of one finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs a program to completion.
pub trait CommandRunner: Send + Sync {
    /// Spawn `program` with `args` and wait for it.
    ///
    /// `Err` means the program could not be started at all; a non-zero
    /// exit is reported through `CommandOutput::status`.
    fn run(&self, program: &str, args: &[String]) -> GhosthandResult<CommandOutput>;
}

/// Runs real processes with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> GhosthandResult<CommandOutput> {
        debug!(program = %program, args = args.len(), "running command");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| {
                GhosthandError::executor(program, format!("could not start '{}': {}", program, e))
            })?;
        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a command and turn a non-zero exit into an `ExecutorFailure` for `kind`.
pub(crate) fn run_checked(
    runner: &dyn CommandRunner,
    kind: &str,
    program: &str,
    args: Vec<String>,
) -> GhosthandResult<CommandOutput> {
    let output = runner.run(program, &args)?;
    if output.success() {
        return Ok(output);
    }
    let stderr = output.stderr.trim();
    Err(GhosthandError::executor(
        kind,
        match output.status {
            Some(code) => format!("'{}' exited with status {}: {}", program, code, stderr),
            None => format!("'{}' was terminated by a signal: {}", program, stderr),
        },
    ))
}
