//! Process execution.
//!
//! Commands are spawned directly (no shell) from an argv list and waited on
//! until they exit. There is no timeout: a hung command stalls the run.

use std::process::{Command, Stdio};

/// Captured outcome of a process that was launched and exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code. Signal terminations are reported as `128 + signal`.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// The process could not be launched.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    /// The argv list was empty.
    #[error("no command to run")]
    EmptyCommand,
    /// The operating system refused to start the program.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Capability to run a command to completion.
pub trait ProcessRunner {
    /// Spawn `argv[0]` with the remaining arguments and block until it exits.
    fn run(&self, argv: &[String]) -> Result<ProcessOutput, SpawnError>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, argv: &[String]) -> Result<ProcessOutput, SpawnError> {
        let (program, args) = argv.split_first().ok_or(SpawnError::EmptyCommand)?;

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| SpawnError::Spawn {
                program: program.clone(),
                source,
            })?;

        Ok(ProcessOutput {
            exit_code: exit_code(&output.status),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

fn exit_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Split a command string into argv tokens on whitespace.
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(String::from).collect()
}

/// Run hook commands in order, fire-and-forget.
///
/// Outcomes are discarded: a hook that fails to launch or exits non-zero
/// never affects the test it surrounds.
pub fn run_hooks(runner: &dyn ProcessRunner, hooks: &[String]) {
    for hook in hooks {
        match runner.run(&split_command(hook)) {
            Ok(output) => {
                tracing::debug!(hook = %hook, exit_code = output.exit_code, "hook finished");
            }
            Err(e) => {
                tracing::debug!(hook = %hook, error = %e, "hook failed to launch");
            }
        }
    }
}
